pub mod confirmation;
pub mod descriptor;
pub mod exchange;
pub mod session;
pub mod text;
pub mod tool;
