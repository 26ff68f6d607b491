use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[cfg(target_family = "wasm")]
use wasm_bindgen::prelude::*;

#[cfg(target_family = "wasm")]
use crate::diag::console_log;

/// Transport event observed on a WebSocket, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsEvent {
    Open,
    Text(String),
    Error,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetError {
    Connect(String),
    Send(String),
    NotConnected,
}

impl std::fmt::Display for NetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "WebSocket error: {e}"),
            Self::Send(e) => write!(f, "Send error: {e}"),
            Self::NotConnected => write!(f, "Not connected"),
        }
    }
}

impl std::error::Error for NetError {}

/// Browser WebSocket carrying JSON text frames.
/// Uses Rc<RefCell> because WASM is single-threaded; callbacks push into a
/// shared queue that the owner drains once per tick. Clones are handles to
/// the same connection.
#[derive(Clone)]
pub struct WsClient {
    #[cfg(target_family = "wasm")]
    ws: Option<web_sys::WebSocket>,
    events: Rc<RefCell<VecDeque<WsEvent>>>,
    #[cfg(not(target_family = "wasm"))]
    fake: Rc<RefCell<FakeSocket>>,
}

/// Native stand-in for the browser socket: records outgoing traffic.
#[cfg(not(target_family = "wasm"))]
#[derive(Default)]
struct FakeSocket {
    url: Option<String>,
    sent: Vec<String>,
    close_frame: Option<(u16, String)>,
}

impl Default for WsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WsClient {
    pub fn new() -> Self {
        Self {
            #[cfg(target_family = "wasm")]
            ws: None,
            events: Rc::new(RefCell::new(VecDeque::new())),
            #[cfg(not(target_family = "wasm"))]
            fake: Rc::new(RefCell::new(FakeSocket::default())),
        }
    }

    /// Open a connection to `url`. Events arrive through [`Self::drain_events`].
    #[cfg(target_family = "wasm")]
    pub fn connect(&mut self, url: &str) -> Result<(), NetError> {
        let ws = web_sys::WebSocket::new(url).map_err(|e| NetError::Connect(format!("{e:?}")))?;

        let events = Rc::clone(&self.events);
        let onmessage =
            Closure::<dyn FnMut(web_sys::MessageEvent)>::new(move |evt: web_sys::MessageEvent| {
                if let Ok(text) = evt.data().dyn_into::<js_sys::JsString>() {
                    events.borrow_mut().push_back(WsEvent::Text(String::from(text)));
                }
            });
        ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        onmessage.forget();

        let events = Rc::clone(&self.events);
        let onopen = Closure::<dyn FnMut()>::new(move || {
            events.borrow_mut().push_back(WsEvent::Open);
        });
        ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        onopen.forget();

        let events = Rc::clone(&self.events);
        let onerror =
            Closure::<dyn FnMut(web_sys::ErrorEvent)>::new(move |_: web_sys::ErrorEvent| {
                events.borrow_mut().push_back(WsEvent::Error);
            });
        ws.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onerror.forget();

        let events = Rc::clone(&self.events);
        let onclose =
            Closure::<dyn FnMut(web_sys::CloseEvent)>::new(move |evt: web_sys::CloseEvent| {
                console_log!("WebSocket closed ({})", evt.code());
                events.borrow_mut().push_back(WsEvent::Closed);
            });
        ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));
        onclose.forget();

        self.ws = Some(ws);
        Ok(())
    }

    /// Native stand-in: remembers the URL; tests inject events.
    #[cfg(not(target_family = "wasm"))]
    pub fn connect(&mut self, url: &str) -> Result<(), NetError> {
        if url.is_empty() {
            return Err(NetError::Connect("empty url".to_string()));
        }
        self.fake.borrow_mut().url = Some(url.to_string());
        Ok(())
    }

    /// Send one text frame.
    #[cfg(target_family = "wasm")]
    pub fn send_text(&self, text: &str) -> Result<(), NetError> {
        let ws = self.ws.as_ref().ok_or(NetError::NotConnected)?;
        ws.send_with_str(text)
            .map_err(|e| NetError::Send(format!("{e:?}")))
    }

    #[cfg(not(target_family = "wasm"))]
    pub fn send_text(&self, text: &str) -> Result<(), NetError> {
        let mut fake = self.fake.borrow_mut();
        if fake.url.is_none() || fake.close_frame.is_some() {
            return Err(NetError::NotConnected);
        }
        fake.sent.push(text.to_string());
        Ok(())
    }

    /// Start the closing handshake; a [`WsEvent::Closed`] follows.
    #[cfg(target_family = "wasm")]
    pub fn close(&self, code: u16, reason: &str) -> Result<(), NetError> {
        let ws = self.ws.as_ref().ok_or(NetError::NotConnected)?;
        ws.close_with_code_and_reason(code, reason)
            .map_err(|e| NetError::Send(format!("{e:?}")))
    }

    #[cfg(not(target_family = "wasm"))]
    pub fn close(&self, code: u16, reason: &str) -> Result<(), NetError> {
        let mut fake = self.fake.borrow_mut();
        if fake.url.is_none() {
            return Err(NetError::NotConnected);
        }
        if fake.close_frame.is_none() {
            fake.close_frame = Some((code, reason.to_string()));
            self.events.borrow_mut().push_back(WsEvent::Closed);
        }
        Ok(())
    }

    /// Take every event received since the last drain.
    pub fn drain_events(&self) -> Vec<WsEvent> {
        self.events.borrow_mut().drain(..).collect()
    }
}

/// Test hooks for the native stand-in.
#[cfg(not(target_family = "wasm"))]
impl WsClient {
    pub fn inject(&self, event: WsEvent) {
        self.events.borrow_mut().push_back(event);
    }

    pub fn url(&self) -> Option<String> {
        self.fake.borrow().url.clone()
    }

    pub fn sent(&self) -> Vec<String> {
        self.fake.borrow().sent.clone()
    }

    pub fn close_frame(&self) -> Option<(u16, String)> {
        self.fake.borrow().close_frame.clone()
    }
}
