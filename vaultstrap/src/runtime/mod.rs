pub mod constants;
pub mod layout;
pub mod options;

pub use layout::HomeLayout;
pub use options::{
    BootstrapOptions, CloudCredentials, CloudOptions, DataBagSecret, PollPolicy, SettleStrategy,
    VaultstrapOptions,
};
