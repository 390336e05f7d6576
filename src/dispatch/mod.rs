pub mod bus;

pub use bus::{DispatchBus, FnSubscriber, Subscriber, Subscription};
