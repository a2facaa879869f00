pub mod blend;
pub mod chemotype;
pub mod effect;
pub mod output;
pub mod profile;
