//! Hydrates Page Model API documents into a navigable page aggregate and
//! keeps it in sync with the Experience Manager while previewing.

pub mod api;
pub mod button;
pub mod cms;
pub mod component;
pub mod config;
pub mod content;
mod emitter;
mod error;
mod factory;
pub mod link;
pub mod meta;
pub mod page;
mod reference;
pub mod relevance;
mod rewriter;
pub mod rpc;
mod sdk;
mod spa;
pub mod telemetry;
pub mod tree;
pub mod url;

pub use api::{Api, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse};
pub use button::{ButtonFactory, ButtonParams, TYPE_MANAGE_CONTENT_BUTTON, TYPE_MANAGE_MENU_BUTTON};
pub use cms::{Cms, Cms14, CmsBridge, CmsEvent, HostWindow};
pub use component::{Component, ComponentFactory, ComponentKind, ModelVersion};
pub use config::{Configuration, RequestContext, Setup};
pub use content::{Content, ContentFactory};
pub use emitter::{Emitter, Event, ListenerId};
pub use error::SpaError;
pub use factory::SimpleFactory;
pub use link::{is_link, Link, LinkFactory, LinkType};
pub use meta::{Meta, MetaCollection, MetaFactory};
pub use page::{get_container_item_content, Page, PageEvent, PageFactory, Visit, Visitor};
pub use reference::{is_reference, resolve, Reference};
pub use rewriter::{LinkRewriter, CONTENT_TYPE_HTML};
pub use rpc::{PostMessage, Rpc, RpcError, RpcMessage};
pub use sdk::Sdk;
pub use spa::{PageSource, Spa};
pub use url::{extract_search_params, UrlBuilder};
