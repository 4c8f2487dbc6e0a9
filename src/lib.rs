//! Reads the basic four info (name, address, birth date, gender) off a Japanese
//! national identity card ("My Number" card), through its profile application.
//!
//! ```no_run
//! # fn main() -> mynacard::Result<()> {
//! let ctx = pcsc::Context::establish(pcsc::Scope::User)?;
//! let mut buf = [0; 2048];
//! let reader = ctx.list_readers(&mut buf)?.next().ok_or(mynacard::Error::TransportUnavailable)?;
//! let card = ctx.connect(reader, pcsc::ShareMode::Shared, pcsc::Protocols::ANY)?;
//!
//! let mut transport = mynacard::PcscTransport::new(card);
//! let info = mynacard::Session::new(&mut transport)
//!     .read_basic_info(mynacard::Pin::from_ascii("1234")?)?;
//! println!("{}", info.name);
//! # Ok(())
//! # }
//! ```

pub mod apdu;
pub mod errors;
pub mod observer;
pub mod pin;
pub mod profile;
pub mod record;
pub mod session;
pub mod status;
pub mod transport;

pub use crate::errors::{Error, Result};
pub use crate::observer::{Observer, TracingObserver};
pub use crate::pin::Pin;
pub use crate::profile::Profile;
pub use crate::record::{BasicInfo, Field};
pub use crate::session::{Session, State, Step};
pub use crate::status::{StatusOutcome, StatusWord};
pub use crate::transport::{PcscTransport, Transport};
