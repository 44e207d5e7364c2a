pub mod config;
pub mod controller;
pub mod entry;
pub mod failure;
pub mod game_client;
pub mod logging;
pub mod rpc;
pub mod seed_poller;
pub mod transaction;
pub mod view_model;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use controller::{
    AppController,
    AppEvent,
    AppSnapshot,
};
pub use game_client::{
    GameContract,
    RpcGameContract,
};
pub use view_model::{
    Action,
    Screen,
};
