//! Typed lookups for the lobby page. A missing or mistyped element is an
//! error the caller sees, never a silent no-op.

#[cfg(target_family = "wasm")]
use wasm_bindgen::JsCast;

use ultictactoe_core::player::Member;

pub const CREATE_NICKNAME_INPUT: &str = "username_create";
pub const JOIN_NICKNAME_INPUT: &str = "username_join";
pub const JOIN_CODE_INPUT: &str = "joinCode";
pub const LOBBY_MODAL: &str = "lobbyModal";
pub const PLAY_MODAL: &str = "playModal";
pub const CREATED_CODE: &str = "createdCode";
pub const PLAYER_LIST: &str = "playerList";
pub const LOBBY_STATUS: &str = "lobbyStatus";
pub const LOBBY_COUNT: &str = "lobbyCount";
pub const START_BUTTON: &str = "startGame_btn";

/// Class that hides an element.
pub const HIDDEN_CLASS: &str = "hidden";
/// Icon classes marking the host in the member list.
pub const HOST_ICON_CLASS: &str = "fa-solid fa-crown text-yellow-400";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiError {
    NoDocument,
    MissingElement(&'static str),
    WrongElementType(&'static str),
    Js(String),
}

impl std::fmt::Display for UiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoDocument => write!(f, "no document available"),
            Self::MissingElement(id) => write!(f, "missing element #{id}"),
            Self::WrongElementType(id) => write!(f, "element #{id} has the wrong type"),
            Self::Js(e) => write!(f, "DOM error: {e}"),
        }
    }
}

impl std::error::Error for UiError {}

/// One rendered row of the member list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRow {
    pub label: String,
    pub crowned: bool,
}

pub fn member_rows(members: &[Member]) -> Vec<MemberRow> {
    members
        .iter()
        .map(|m| MemberRow {
            label: m.name.clone(),
            crowned: m.is_host,
        })
        .collect()
}

#[cfg(target_family = "wasm")]
fn document() -> Result<web_sys::Document, UiError> {
    web_sys::window()
        .and_then(|w| w.document())
        .ok_or(UiError::NoDocument)
}

#[cfg(target_family = "wasm")]
pub fn require_element(id: &'static str) -> Result<web_sys::Element, UiError> {
    document()?
        .get_element_by_id(id)
        .ok_or(UiError::MissingElement(id))
}

#[cfg(target_family = "wasm")]
pub fn require_input(id: &'static str) -> Result<web_sys::HtmlInputElement, UiError> {
    require_element(id)?
        .dyn_into::<web_sys::HtmlInputElement>()
        .map_err(|_| UiError::WrongElementType(id))
}

#[cfg(target_family = "wasm")]
pub fn input_value(id: &'static str) -> Result<String, UiError> {
    Ok(require_input(id)?.value())
}

#[cfg(target_family = "wasm")]
pub fn set_text(id: &'static str, text: &str) -> Result<(), UiError> {
    require_element(id)?.set_text_content(Some(text));
    Ok(())
}

#[cfg(target_family = "wasm")]
pub fn set_hidden(id: &'static str, hidden: bool) -> Result<(), UiError> {
    let classes = require_element(id)?.class_list();
    let result = if hidden {
        classes.add_1(HIDDEN_CLASS)
    } else {
        classes.remove_1(HIDDEN_CLASS)
    };
    result.map_err(|e| UiError::Js(format!("{e:?}")))
}

#[cfg(target_family = "wasm")]
pub fn render_player_list(members: &[Member]) -> Result<(), UiError> {
    let doc = document()?;
    let list = require_element(PLAYER_LIST)?;
    list.set_inner_html("");
    let js = |e: wasm_bindgen::JsValue| UiError::Js(format!("{e:?}"));
    for row in member_rows(members) {
        let li = doc.create_element("li").map_err(js)?;
        li.set_text_content(Some(&row.label));
        if row.crowned {
            let icon = doc.create_element("i").map_err(js)?;
            icon.set_class_name(HOST_ICON_CLASS);
            li.append_child(&icon).map_err(js)?;
        }
        list.append_child(&li).map_err(js)?;
    }
    Ok(())
}
