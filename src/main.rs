// ABOUTME: Main entry point for the webssh TUI client

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste, Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{prelude::*, Terminal};
use std::{
    io::{self, Write},
    sync::Arc,
    time::Duration,
};
use tracing::{error, info};

use webssh_client::{
    app::{App, EventHandler},
    cli::Cli,
    components::LayoutComponent,
    config::ClientConfig,
    session::Viewport,
    transport::{HttpProbeClient, StompConnector},
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging()?;
    setup_panic_handler();

    let mut config = ClientConfig::load(cli.config.as_deref())?;
    cli.apply_to(&mut config);
    info!("Using gateway {}", config.server.url);

    let connector = Arc::new(StompConnector::new(
        config.server.url.clone(),
        config.stomp_host()?,
        config.handshake_timeout(),
    ));
    let window = match crossterm::terminal::size() {
        Ok((cols, rows)) => Viewport::new(rows, cols),
        Err(_) => Viewport::new(config.terminal.rows, config.terminal.cols),
    };

    let mut app = App::new(&config, connector, Arc::new(HttpProbeClient::new()), window)?;
    app.new_session(None);
    match cli.login_request(&config) {
        Some(login) => drop(app.login(login)),
        None => drop(app.connect()),
    }

    let mut layout = LayoutComponent::new();
    run_tui(&mut app, &mut layout).await?;

    app.disconnect();
    info!("Exiting");
    Ok(())
}

async fn run_tui(app: &mut App, layout: &mut LayoutComponent) -> Result<()> {
    enable_raw_mode().context("Terminal not compatible")?;
    let mut stdout = io::stdout();
    enter_screen(&mut stdout)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, app, layout).await;

    disable_raw_mode()?;
    leave_screen(terminal.backend_mut())?;
    terminal.show_cursor()?;

    result
}

/// Alternate screen plus bracketed paste so pasted text arrives as one event
fn enter_screen(out: &mut impl Write) -> io::Result<()> {
    execute!(out, EnterAlternateScreen, EnableBracketedPaste)
}

fn leave_screen(out: &mut impl Write) -> io::Result<()> {
    execute!(out, DisableBracketedPaste, LeaveAlternateScreen)
}

async fn event_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    layout: &mut LayoutComponent,
) -> Result<()> {
    let mut keys = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_millis(250));

    loop {
        terminal.draw(|frame| layout.render(frame, app))?;

        tokio::select! {
            message = app.next_event() => {
                if let Some(message) = message {
                    app.handle(message);
                }
            }
            event = keys.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if let Some(app_event) = EventHandler::handle_key_event(key, app.key_context()) {
                        EventHandler::process_event(app_event, app);
                    }
                }
                Some(Ok(Event::Resize(cols, rows))) => {
                    app.window_resized(Viewport::new(rows, cols));
                }
                Some(Ok(Event::Paste(text))) => {
                    app.type_input(&text);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => error!("Error reading terminal events: {}", e),
                None => break,
            },
            _ = tick.tick() => app.tick(),
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn setup_logging() -> Result<()> {
    use std::fs::OpenOptions;
    use std::path::PathBuf;
    use tracing_subscriber::prelude::*;

    let log_dir = std::env::var("HOME")
        .map(|home| PathBuf::from(home).join(".webssh-client").join("logs"))
        .unwrap_or_else(|_| PathBuf::from(".webssh-client/logs"));
    let _ = std::fs::create_dir_all(&log_dir);

    let log_file = log_dir.join(format!(
        "webssh-client-{}.log",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("Failed to create log file {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(file)
                .with_ansi(false),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webssh_client=info,webssh=info".into()),
        )
        .init();
    Ok(())
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        // Restore the terminal before reporting
        let _ = disable_raw_mode();
        let _ = leave_screen(&mut std::io::stderr());

        error!("Application panicked: {}", panic_info);
        eprintln!("Application panicked: {}", panic_info);
        eprintln!("Please check the logs for more details.");
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_setup_toggles_bracketed_paste() {
        let mut entered = Vec::new();
        enter_screen(&mut entered).unwrap();
        let entered = String::from_utf8(entered).unwrap();
        assert!(entered.contains("\x1b[?1049h"));
        assert!(entered.contains("\x1b[?2004h"));

        let mut left = Vec::new();
        leave_screen(&mut left).unwrap();
        let left = String::from_utf8(left).unwrap();
        assert!(left.contains("\x1b[?2004l"));
        assert!(left.contains("\x1b[?1049l"));
    }
}
