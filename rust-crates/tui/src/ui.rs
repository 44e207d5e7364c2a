use claw_flip::{
    Action,
    AppSnapshot,
    Screen,
    transaction::{
        TxKind,
        TxStatus,
    },
    view_model::LastCall,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use flip_abi::{
    ShortAddress,
    Wei,
    format_ether,
};
use futures::StreamExt;
use ratatui::{prelude::*, widgets::*};
use std::io::stdout;

const ETH_PLACES: usize = 4;
const FEE_SPLIT: &str = "88% prize pool • 5% buyback • 5% treasury • 2% referrer";
const COIN_FRAMES: [&str; 4] = ["( H )", "( | )", "( T )", "( | )"];

#[derive(Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    Request(Action),
    Refresh,
    SetWager(String),
    SetReferrer(String),
    Redraw,
}

pub type InputEventReceiver = EventStream;

#[derive(Debug)]
pub struct UiState {
    mode: Mode,
    header: String,
    wager: String,
    referrer: String,
    frame: usize,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    EditWager(String),
    EditReferrer(String),
    QuitModal,
}

impl UiState {
    pub fn new(header: impl Into<String>) -> Self {
        UiState {
            mode: Mode::Normal,
            header: header.into(),
            wager: String::new(),
            referrer: String::new(),
            frame: 0,
            terminal: None,
        }
    }

    pub fn advance_animation(&mut self) {
        self.frame = self.frame.wrapping_add(1);
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(input: &mut InputEventReceiver) -> Result<Event> {
    match input.next().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    state.wager = snap.entry.wager.clone();
    state.referrer = snap.entry.referrer.clone();
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

/// Maps a raw terminal event onto an application event, updating the
/// input mode as a side effect.
pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let key = match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => key,
        Event::Resize(..) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    if is_interrupt(&key) {
        return Some(UserEvent::Quit);
    }
    match &mut state.mode {
        Mode::EditWager(buffer) => match key.code {
            KeyCode::Enter => {
                let wager = buffer.trim().to_string();
                state.mode = Mode::Normal;
                Some(UserEvent::SetWager(wager))
            }
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Backspace => {
                buffer.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => {
                buffer.push(c);
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::EditReferrer(buffer) => match key.code {
            KeyCode::Enter => {
                let referrer = buffer.trim().to_string();
                state.mode = Mode::Normal;
                Some(UserEvent::SetReferrer(referrer))
            }
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Backspace => {
                buffer.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) if c.is_ascii_alphanumeric() => {
                buffer.push(c);
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::QuitModal => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.mode = Mode::QuitModal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('e') => Some(UserEvent::Request(Action::EnterGame)),
            KeyCode::Char('h') => Some(UserEvent::Request(Action::Flip { heads: true })),
            KeyCode::Char('t') => Some(UserEvent::Request(Action::Flip { heads: false })),
            KeyCode::Char('c') => Some(UserEvent::Request(Action::CashOut)),
            KeyCode::Char('p') => Some(UserEvent::Request(Action::ClaimPrize)),
            KeyCode::Char('u') => Some(UserEvent::Refresh),
            KeyCode::Char('w') => {
                state.mode = Mode::EditWager(state.wager.clone());
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('r') => {
                state.mode = Mode::EditReferrer(state.referrer.clone());
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
    }
}

// raw mode swallows SIGINT, so Ctrl-C arrives as a key
fn is_interrupt(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Length(6), // wallet | round | buyback
            Constraint::Min(12),   // game
            Constraint::Length(6), // status/errors
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_header(f, chunks[0], state);
    draw_top(f, chunks[1], snap);
    draw_game(f, chunks[2], state, snap);
    draw_status(f, chunks[3], snap);
    draw_help(f, chunks[4]);
    if snap.celebrating {
        draw_celebration(f, snap);
    }
    draw_modals(f, state);
}

fn draw_header(f: &mut Frame, area: Rect, state: &UiState) {
    let widget = Paragraph::new(state.header.as_str())
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL).title("Claw Flip"));
    f.render_widget(widget, area);
}

fn draw_top(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(34),
            Constraint::Percentage(33),
            Constraint::Percentage(33),
        ])
        .split(area);
    draw_wallet_panel(f, cols[0], snap);
    draw_round_panel(f, cols[1], snap);
    draw_buyback_panel(f, cols[2], snap);
}

fn eth(amount: Option<Wei>) -> String {
    match amount {
        Some(wei) => format!("{} ETH", format_ether(wei, ETH_PLACES)),
        None => "...".to_string(),
    }
}

fn draw_wallet_panel(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let lines = match snap.chain.account {
        Some(account) => vec![
            Line::from(format!("Account: {}", account.short())),
            Line::from(format!("Balance: {}", eth(snap.chain.balance))),
            Line::from(format!("Unclaimed: {}", eth(snap.chain.unclaimed_prize))),
        ],
        None => vec![Line::from("Not connected")],
    };
    let widget =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Wallet"));
    f.render_widget(widget, area);
}

fn draw_round_panel(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let lines = match &snap.chain.round {
        Some(round) => {
            let leader = match round.leader {
                Some(leader) => leader.short(),
                None => "None yet".to_string(),
            };
            vec![
                Line::from(format!("Prize pool: {}", eth(Some(round.prize_pool)))),
                Line::from(format!(
                    "Players: {} | Top streak: {}",
                    round.participant_count, round.highest_streak
                )),
                Line::from(format!("Leader: {leader}")),
            ]
        }
        None => vec![Line::from("Loading round...")],
    };
    let widget =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Round"));
    f.render_widget(widget, area);
}

fn draw_buyback_panel(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines = vec![Line::from(format!("Accumulated: {}", eth(snap.chain.buyback)))];
    if let Some(stats) = &snap.chain.stats {
        lines.push(Line::from(format!(
            "Executed: {}",
            eth(Some(stats.total_buyback_executed))
        )));
        lines.push(Line::from(format!(
            "Prizes paid: {}",
            eth(Some(stats.total_prizes_distributed))
        )));
    }
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Buyback Fund"));
    f.render_widget(widget, area);
}

fn button(label: &str, enabled: bool) -> Span<'static> {
    let style = if enabled {
        Style::default().fg(Color::Black).bg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Span::styled(format!(" {label} "), style)
}

fn tx_line(snap: &AppSnapshot, kind: TxKind) -> Option<Line<'static>> {
    let (text, color) = match snap.transactions.get(kind).status() {
        TxStatus::Idle => return None,
        TxStatus::Pending => ("waiting for wallet...".to_string(), Color::Yellow),
        TxStatus::Confirming { hash } => (format!("confirming {hash}"), Color::Yellow),
        TxStatus::Success { .. } => ("confirmed".to_string(), Color::Green),
        TxStatus::Error { failure } => (failure.user_message(), Color::Red),
    };
    Some(Line::from(Span::styled(
        format!("{}: {text}", kind.label()),
        Style::default().fg(color),
    )))
}

fn draw_game(f: &mut Frame, area: Rect, state: &UiState, snap: &AppSnapshot) {
    let mut lines: Vec<Line> = match snap.screen {
        Screen::AwaitingConnection => vec![
            Line::from("Waiting for the endpoint to expose a wallet account."),
            Line::from("Unlock or connect an account on the RPC endpoint; press u to retry."),
        ],
        Screen::Entry => entry_lines(snap),
        Screen::AwaitingRandomness => {
            let dots = ".".repeat(state.frame % 4);
            let mut lines = vec![
                Line::from(Span::styled(
                    format!("Waiting for randomness{dots}"),
                    Style::default().fg(Color::Yellow),
                )),
                Line::from("The oracle is fulfilling your seed. Flips unlock when it lands."),
            ];
            if snap.polling_seed {
                lines.push(Line::from(Span::styled(
                    "checking every 2s",
                    Style::default().fg(Color::DarkGray),
                )));
            }
            lines
        }
        Screen::ReadyToFlip => flip_lines(state, snap),
    };

    if snap.claim_available {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled(
                format!("Prize waiting: {} ", eth(snap.chain.unclaimed_prize)),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
            button("[p] Claim Prize", snap.is_enabled(Action::ClaimPrize)),
        ]));
    }

    lines.push(Line::from(""));
    lines.extend(TxKind::ALL.into_iter().filter_map(|kind| tx_line(snap, kind)));

    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Game"));
    f.render_widget(widget, area);
}

fn entry_lines(snap: &AppSnapshot) -> Vec<Line<'static>> {
    let mut wager = vec![Span::raw(format!("Wager: {} ETH  [w] edit", snap.entry.wager))];
    if let Some(min) = snap.chain.min_entry {
        let style = if snap.below_minimum {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        wager.push(Span::styled(
            format!("  (suggested minimum {} ETH)", format_ether(min, ETH_PLACES)),
            style,
        ));
    }
    let referrer = if snap.entry.referrer.trim().is_empty() {
        "none".to_string()
    } else {
        snap.entry.referrer.clone()
    };
    vec![
        Line::from("No active session. Enter the game to start a streak."),
        Line::from(""),
        Line::from(wager),
        Line::from(format!("Referrer: {referrer}  [r] edit")),
        Line::from(Span::styled(FEE_SPLIT, Style::default().fg(Color::DarkGray))),
        Line::from(""),
        Line::from(button("[e] Enter Game", snap.is_enabled(Action::EnterGame))),
    ]
}

fn side(heads: bool) -> &'static str {
    if heads { "HEADS" } else { "TAILS" }
}

fn last_call_line(call: &LastCall) -> Line<'static> {
    let mut spans = vec![Span::raw(format!("Called {}", side(call.heads)))];
    if let Some(outcome) = &call.outcome {
        let (verdict, color) = if outcome.won {
            ("won", Color::Green)
        } else {
            ("lost", Color::Red)
        };
        spans.push(Span::styled(
            format!(" | landed {}: you {verdict}", side(outcome.result_heads)),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
    }
    Line::from(spans)
}

fn flip_lines(state: &UiState, snap: &AppSnapshot) -> Vec<Line<'static>> {
    let coin = if snap.flip_in_flight() {
        COIN_FRAMES[state.frame % COIN_FRAMES.len()].to_string()
    } else {
        match snap.last_call.as_ref().and_then(|c| c.outcome.as_ref()) {
            Some(outcome) => format!("( {} )", &side(outcome.result_heads)[..1]),
            None => "( ? )".to_string(),
        }
    };
    let mut lines = vec![
        Line::from(Span::styled(
            format!("Streak: {}", snap.streak),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(coin, Style::default().fg(Color::Yellow))),
        Line::from(""),
    ];
    if let Some(call) = &snap.last_call {
        lines.push(last_call_line(call));
    }
    lines.push(Line::from(vec![
        button("[h] HEADS", snap.is_enabled(Action::Flip { heads: true })),
        Span::raw("  "),
        button("[t] TAILS", snap.is_enabled(Action::Flip { heads: false })),
        Span::raw("  "),
        button("[c] Cash Out", snap.is_enabled(Action::CashOut)),
    ]));
    lines
}

fn draw_status(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let status = if snap.status.trim().is_empty() {
        "Ready"
    } else {
        snap.status.as_str()
    };
    let status_widget = Paragraph::new(status)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(Style::default().fg(Color::Green));
    f.render_widget(status_widget, chunks[0]);

    let lines: Vec<Line> = snap
        .errors
        .iter()
        .rev()
        .take(4)
        .map(|e| Line::from(e.clone()))
        .collect();
    let errors_widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Errors"))
        .style(Style::default().fg(Color::Red));
    f.render_widget(errors_widget, chunks[1]);
}

fn draw_help(f: &mut Frame, area: Rect) {
    let help = Paragraph::new(
        "e enter | w wager | r referrer | h heads | t tails | c cash out | p claim | u refresh | q/Esc quit",
    )
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_celebration(f: &mut Frame, snap: &AppSnapshot) {
    let area = centered_rect(40, 25, f.area());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title("Winner");
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            "CLAW-SOME!",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("Balance: {}", eth(snap.chain.balance))),
    ];
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(
        Paragraph::new(text).alignment(Alignment::Center),
        block.inner(area),
    );
}

fn draw_modals(f: &mut Frame, state: &UiState) {
    let (title, body) = match &state.mode {
        Mode::Normal => return,
        Mode::EditWager(buffer) => (
            "Wager (ETH)",
            format!("{buffer}_\n\nEnter to save, Esc to cancel"),
        ),
        Mode::EditReferrer(buffer) => (
            "Referrer",
            format!("{buffer}_\n\nLeave blank for none. Enter to save, Esc to cancel"),
        ),
        Mode::QuitModal => ("Confirm Quit", "Quit the game? (Y/N)".to_string()),
    };
    let area = centered_rect(50, 20, f.area());
    let block = Block::default().borders(Borders::ALL).title(title);
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(Paragraph::new(body), block.inner(area));
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn press(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn state() -> UiState {
        let mut state = UiState::new("test");
        state.wager = "0.001".to_string();
        state
    }

    #[test]
    fn interpret_event__maps_game_keys_to_actions() {
        let mut state = state();
        assert_eq!(
            interpret_event(&mut state, press(KeyCode::Char('h'))),
            Some(UserEvent::Request(Action::Flip { heads: true }))
        );
        assert_eq!(
            interpret_event(&mut state, press(KeyCode::Char('t'))),
            Some(UserEvent::Request(Action::Flip { heads: false }))
        );
        assert_eq!(
            interpret_event(&mut state, press(KeyCode::Char('p'))),
            Some(UserEvent::Request(Action::ClaimPrize))
        );
        assert_eq!(interpret_event(&mut state, press(KeyCode::Char('x'))), None);
    }

    #[test]
    fn interpret_event__quit_requires_confirmation() {
        // given
        let mut state = state();

        // when
        let first = interpret_event(&mut state, press(KeyCode::Char('q')));
        let cancel = interpret_event(&mut state, press(KeyCode::Char('n')));
        interpret_event(&mut state, press(KeyCode::Esc));
        let confirm = interpret_event(&mut state, press(KeyCode::Char('y')));

        // then
        assert_eq!(first, Some(UserEvent::Redraw));
        assert_eq!(cancel, Some(UserEvent::Redraw));
        assert_eq!(confirm, Some(UserEvent::Quit));
    }

    #[test]
    fn interpret_event__wager_editor_starts_from_current_value() {
        let mut state = state();
        interpret_event(&mut state, press(KeyCode::Char('w')));
        interpret_event(&mut state, press(KeyCode::Backspace));
        interpret_event(&mut state, press(KeyCode::Char('5')));
        interpret_event(&mut state, press(KeyCode::Char('x')));

        let saved = interpret_event(&mut state, press(KeyCode::Enter));

        assert_eq!(saved, Some(UserEvent::SetWager("0.005".to_string())));
        assert_eq!(state.mode, Mode::Normal);
    }

    #[test]
    fn interpret_event__ctrl_c_quits_from_any_mode() {
        let mut state = state();
        interpret_event(&mut state, press(KeyCode::Char('r')));
        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(interpret_event(&mut state, ctrl_c), Some(UserEvent::Quit));
    }
}
