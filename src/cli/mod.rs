mod add_none;
mod clean;
mod export;
mod recognise;
mod validate;

pub use add_none::*;
pub use clean::*;
pub use export::*;
pub use recognise::*;
pub use validate::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> anyhow::Result<()>;
}
