//! Chrome implementations of the [`Browser`](crate::Browser) and [`Page`](crate::Page) traits.

mod browser;
mod page;
mod script;

pub use browser::CdpBrowser;
pub use page::CdpPage;
