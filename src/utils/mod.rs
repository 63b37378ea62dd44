pub mod autocomplete;
pub mod clock;
pub mod display;
