//! Desktop assistant core: query classification, dispatch and the handlers
//! behind it. The `assistant` binary wires these to the frontend over
//! JSON-line IPC; `imagegen-worker` reuses the config, logging and handoff
//! modules.

pub mod automation;
pub mod chatbot;
pub mod chatlog;
pub mod config;
pub mod decision;
pub mod dispatch;
pub mod imagegen;
pub mod ipc;
pub mod llm;
pub mod logging;
pub mod realtime;
pub mod speech;
pub mod status;
pub mod text;
