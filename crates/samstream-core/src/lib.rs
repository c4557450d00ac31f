pub mod dtype;
pub mod error;
pub mod instance;
pub mod learner;
pub mod schema;
pub mod window;

pub use dtype::Float;
pub use error::{StreamError, StreamResult};
pub use instance::{same_instance, Instance, InstanceRef};
pub use learner::StreamClassifier;
pub use schema::{Attribute, StreamHeader};
pub use window::InstanceWindow;
