pub mod class;
pub mod class_property;
pub mod scalar;
pub mod settings;
pub mod tag;

pub use class::{Class, CombinedClass};
pub use class_property::ClassProperty;
pub use scalar::Scalar;
pub use settings::UserSettings;
pub use tag::Tag;
