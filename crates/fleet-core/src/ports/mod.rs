//! Capability traits: the seams where `fleet-engine` plugs in real chain,
//! DEX, bundler, and time implementations, and tests plug in fakes.
//!
//! Nothing in this module owns a `reqwest::Client`, a signer, or a database
//! handle; each trait describes a capability, not its implementation.

pub mod account_provider;
pub mod bundler;
pub mod clock;
pub mod swap_encoder;

pub use account_provider::{AccountProvider, AccountSession, Call, ReceiptOutcome, UserOpHandle};
pub use bundler::{BundlerAdapter, GasEstimate, ReceiptStatus, SendResult, UserOperation};
pub use clock::{Clock, SystemClock};
pub use swap_encoder::{SwapEncoder, SwapParams};
