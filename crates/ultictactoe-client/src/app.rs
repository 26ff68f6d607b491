use wasm_bindgen::prelude::*;

use ultictactoe_core::net::protocol::ws_base;
use ultictactoe_core::player::DEFAULT_NICKNAME;

use crate::diag::console_warn;
use crate::dom::{self, UiError};
use crate::lobby::{LobbyController, LobbyUpdate};

/// WASM entry point.
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}

fn js_err(e: UiError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn alert(message: &str) {
    if let Some(window) = web_sys::window()
        && let Err(e) = window.alert_with_message(message)
    {
        console_warn!("alert failed: {e:?}");
    }
}

/// Page-facing handle. The page calls the button handlers and `tick` on a
/// timer; `tick` applies queued network events to the DOM.
#[wasm_bindgen]
pub struct LobbyApp {
    controller: LobbyController,
}

#[wasm_bindgen]
impl LobbyApp {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<LobbyApp, JsValue> {
        let location = web_sys::window()
            .ok_or_else(|| js_err(UiError::NoDocument))?
            .location();
        let secure = location.protocol()? == "https:";
        let host = location.host()?;
        Ok(Self {
            controller: LobbyController::new(ws_base(secure, &host)),
        })
    }

    /// "Create game" submit handler.
    pub fn create_game(&mut self) -> Result<(), JsValue> {
        let nickname = dom::input_value(dom::CREATE_NICKNAME_INPUT).map_err(js_err)?;
        let nickname = match nickname.trim() {
            "" => DEFAULT_NICKNAME,
            name => name,
        };
        if let Err(e) = self.controller.create_game(nickname) {
            alert(e.user_message());
        }
        Ok(())
    }

    /// "Join game" submit handler.
    pub fn join_game(&mut self) -> Result<(), JsValue> {
        let code = dom::input_value(dom::JOIN_CODE_INPUT).map_err(js_err)?;
        let nickname = dom::input_value(dom::JOIN_NICKNAME_INPUT).map_err(js_err)?;
        if let Err(e) = self.controller.join_game(&code, &nickname) {
            alert(e.user_message());
        }
        Ok(())
    }

    /// Start button handler.
    pub fn start_game(&mut self) {
        if let Err(e) = self.controller.request_start() {
            alert(e.user_message());
        }
    }

    pub fn leave(&mut self) -> Result<(), JsValue> {
        self.controller.leave();
        dom::set_hidden(dom::LOBBY_MODAL, true).map_err(js_err)
    }

    /// Apply pending network events to the page.
    pub fn tick(&mut self) -> Result<(), JsValue> {
        for update in self.controller.poll() {
            apply_update(update).map_err(js_err)?;
        }
        Ok(())
    }
}

fn apply_update(update: LobbyUpdate) -> Result<(), UiError> {
    match update {
        LobbyUpdate::Status(text) => dom::set_text(dom::LOBBY_STATUS, &text),
        LobbyUpdate::LobbyOpened { room, .. } => {
            dom::set_text(dom::CREATED_CODE, room.as_str())?;
            dom::render_player_list(&[])?;
            dom::set_hidden(dom::START_BUTTON, true)?;
            dom::set_hidden(dom::LOBBY_MODAL, false)
        },
        LobbyUpdate::Members {
            members,
            count,
            can_start,
        } => {
            dom::render_player_list(&members)?;
            dom::set_text(dom::LOBBY_COUNT, &count.to_string())?;
            dom::set_hidden(dom::START_BUTTON, !can_start)
        },
        LobbyUpdate::LobbyClosed => dom::set_hidden(dom::LOBBY_MODAL, true),
        LobbyUpdate::Error(e) => {
            alert(e.user_message());
            dom::set_hidden(dom::PLAY_MODAL, false)
        },
        LobbyUpdate::Navigate(url) => {
            let location = web_sys::window().ok_or(UiError::NoDocument)?.location();
            location
                .set_href(&url)
                .map_err(|e| UiError::Js(format!("{e:?}")))
        },
    }
}
