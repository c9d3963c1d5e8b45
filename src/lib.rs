#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;
pub mod canvas;
pub mod cli;
pub mod compositor;
pub mod crop;
pub mod hit_test;
pub mod interaction;
pub mod io;
pub mod layers;
pub mod ops;
pub mod overlay;
pub mod project;
pub mod settings;
pub mod viewport;
