//! Transport contract between the operator's chat surface and the
//! automation pipeline. Concrete platform transports live outside this
//! repository and plug in through [`ChannelAdapter`].

mod loopback;
mod traits;
mod types;

pub use loopback::LoopbackAdapter;
pub use traits::ChannelAdapter;
pub use types::{Attachment, ChannelId, InboundMessage, MessageId, OutboundMessage, SenderId};
