pub mod events;
pub mod lookup;
pub mod model;
pub mod selector;
pub mod time;
