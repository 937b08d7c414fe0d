use rayon::prelude::*;
use serde_json::{json, Value};

use crate::compute::{ComputeModule, Context};
use crate::protocol::{Action, Event, Surface};
use crate::runtime::ModuleLoader;

/// Reference compute module: a counter, an attachable surface and a parallel
/// sum of squares.
#[derive(Debug, Default)]
pub struct Atlas {
    counter: u64,
    pings: u64,
    surface: Option<Surface>,
}

impl Atlas {
    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }
}

/// Sum of squares of `0..=limit`, or `None` once it no longer fits a `u64`.
fn crunch(limit: u32) -> Option<u64> {
    (0..=u64::from(limit))
        .into_par_iter()
        .map(|x| x.checked_mul(x))
        .try_reduce(|| 0, |a, b| a.checked_add(b))
}

impl ComputeModule for Atlas {
    fn execute(&mut self, action: Action, cx: &mut Context<'_>) -> anyhow::Result<Value> {
        let value = match action {
            Action::Ping => {
                self.pings += 1;
                cx.emit(Event::new("count", self.pings));
                json!("pong")
            }
            Action::Crunch { limit } => {
                let sum = cx
                    .pool()
                    .install(|| crunch(limit))
                    .ok_or_else(|| anyhow::anyhow!("crunch limit {limit} overflows"))?;
                json!(sum)
            }
            Action::Attach { canvas } => {
                if canvas.width == 0 || canvas.height == 0 {
                    anyhow::bail!("surface `{}` has no area", canvas.id);
                }
                tracing::debug!("Attaching surface {} ({}x{})", canvas.id, canvas.width, canvas.height);
                let value = serde_json::to_value(&canvas)?;
                self.surface = Some(canvas);
                value
            }
            Action::Query => json!(self.counter),
            Action::Inc => {
                self.counter += 1;
                json!(self.counter)
            }
            Action::Dec => {
                self.counter = self.counter.saturating_sub(1);
                json!(self.counter)
            }
        };
        Ok(value)
    }
}

/// Loader for [`Atlas`]; loading never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct AtlasLoader;

impl ModuleLoader for AtlasLoader {
    type Module = Atlas;

    async fn init(&mut self) -> anyhow::Result<Atlas> {
        Ok(Atlas::default())
    }
}
