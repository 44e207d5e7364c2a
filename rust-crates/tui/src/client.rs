use crate::ui;
use claw_flip::{
    AppController,
    AppEvent,
    GameContract,
    RpcGameContract,
    Screen,
    config::AppConfig,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use flip_abi::ShortAddress;
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time,
};
use tracing::{
    info,
    warn,
};

const REDRAW_INTERVAL: Duration = Duration::from_millis(250);
const CONNECTION_RECHECK: Duration = Duration::from_secs(5);

fn header(config: &AppConfig) -> String {
    let mut header = format!(
        "{} | contract {} | rpc {}",
        config.network,
        config.contract.short(),
        config.rpc_url
    );
    if let Some(link) = &config.explorer_link {
        header.push_str(&format!(" | {link}"));
    }
    header
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let contract = RpcGameContract::new(&config.rpc_url, config.contract, config.receipt.clone())
        .wrap_err("failed to set up JSON-RPC client")?;
    let (controller, events) = AppController::new(Arc::new(contract), config.timings.clone());
    let mut ui_state = ui::UiState::new(header(&config));
    let mut input_events = ui::input_event_stream();

    info!(network = %config.network, contract = %config.contract, "starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(controller, events, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

async fn run_loop<C: GameContract>(
    mut controller: AppController<C>,
    mut events: mpsc::UnboundedReceiver<AppEvent>,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    controller.refresh().await;
    ui::draw(ui_state, &controller.snapshot()).wrap_err("initial draw failed")?;

    let mut redraw = time::interval(REDRAW_INTERVAL);
    let mut recheck = time::interval(CONNECTION_RECHECK);
    recheck.tick().await;

    loop {
        tokio::select! {
            maybe_event = events.recv() => {
                let Some(event) = maybe_event else {
                    warn!("controller event channel closed");
                    break;
                };
                controller.handle_event(event).await;
                ui::draw(ui_state, &controller.snapshot())
                    .wrap_err("draw after controller event failed")?;
            }
            _ = redraw.tick() => {
                ui_state.advance_animation();
                ui::draw(ui_state, &controller.snapshot())
                    .wrap_err("draw on redraw tick failed")?;
            }
            _ = recheck.tick() => {
                if controller.view().screen() == Screen::AwaitingConnection {
                    controller.refresh().await;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Request(action) => {
                        if let Err(err) = controller.request(action) {
                            controller.report(err);
                        }
                    }
                    ui::UserEvent::Refresh => controller.refresh().await,
                    ui::UserEvent::SetWager(wager) => {
                        controller.entry_form_mut().wager = wager;
                    }
                    ui::UserEvent::SetReferrer(referrer) => {
                        controller.entry_form_mut().referrer = referrer;
                    }
                    ui::UserEvent::Redraw => {}
                }
                ui::draw(ui_state, &controller.snapshot())
                    .wrap_err("draw after input failed")?;
            }
        }
    }

    controller.shutdown();
    Ok(())
}
