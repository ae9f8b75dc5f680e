pub mod mnemo;
pub mod webflow;
