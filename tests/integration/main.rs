// Each module here exercises the public API the way a plant program would.

mod lifecycle_test;
mod live_broker_test;
mod routing_test;
