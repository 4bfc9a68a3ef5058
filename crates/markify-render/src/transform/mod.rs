//! Whole-document passes run between parsing and serialization.

mod links;
mod title;

pub use links::RelativeImageLinks;
pub use title::TitleExtractor;
