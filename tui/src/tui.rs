use std::io::IsTerminal;
use std::io::Stdout;
use std::io::stdin;
use std::io::stdout;

use color_eyre::eyre::Result;
use color_eyre::eyre::WrapErr;
use color_eyre::eyre::eyre;
use crossterm::event::DisableBracketedPaste;
use crossterm::event::DisableMouseCapture;
use crossterm::event::EnableBracketedPaste;
use crossterm::event::EnableMouseCapture;
use crossterm::execute;
use crossterm::terminal::EnterAlternateScreen;
use crossterm::terminal::LeaveAlternateScreen;
use crossterm::terminal::disable_raw_mode;
use crossterm::terminal::enable_raw_mode;
use ratatui::backend::CrosstermBackend;

pub(crate) type Terminal = ratatui::Terminal<CrosstermBackend<Stdout>>;

/// Switch the terminal into raw mode on the alternate screen.
pub(crate) fn init() -> Result<Terminal> {
    if !stdin().is_terminal() || !stdout().is_terminal() {
        return Err(eyre!("helm needs an interactive terminal"));
    }
    set_panic_hook();
    enable_raw_mode().wrap_err("failed to enable raw mode")?;
    execute!(
        stdout(),
        EnterAlternateScreen,
        EnableBracketedPaste,
        EnableMouseCapture
    )
    .wrap_err("failed to enter the alternate screen")?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(terminal)
}

pub(crate) fn restore() -> Result<()> {
    execute!(
        stdout(),
        DisableMouseCapture,
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    disable_raw_mode()?;
    Ok(())
}

fn set_panic_hook() {
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        hook(panic_info);
    }));
}
