use anyhow::Result;
use simple_logger::{set_up_color_terminal, SimpleLogger};

/// Wires `tracing` events (forwarded through `log`) to the terminal.
pub fn init() -> Result<()> {
    set_up_color_terminal();
    let logger = SimpleLogger::new();
    logger.init()?;
    Ok(())
}
