pub mod elements;
pub mod html_to_markdown;
pub mod math;
pub mod noise;
pub mod rules;
pub mod tables;
pub mod whitespace;
