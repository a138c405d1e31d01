//! Authoring buttons, expressed as meta-data collections.

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::content::Content;
use crate::error::SpaError;
use crate::factory::SimpleFactory;
use crate::meta::{MetaCollection, MetaCollectionModel, MetaFactory, MetaModel, MetaPosition};

pub const TYPE_MANAGE_CONTENT_BUTTON: &str = "MANAGE_CONTENT_LINK";
pub const TYPE_MANAGE_MENU_BUTTON: &str = "EDIT_MENU_LINK";

/// Parameters of the "manage content" button.
#[derive(Debug, Clone, Default)]
pub struct ManageContentButton {
    /// Content to edit; its meta-data is extended with the picker settings.
    pub content: Option<Arc<Content>>,
    pub document_template_query: Option<String>,
    pub folder_template_query: Option<String>,
    /// Initial location of a new document, relative to `root`.
    pub path: Option<String>,
    /// Component parameter that stores the selected document path.
    pub parameter: Option<String>,
    pub picker_configuration: Option<String>,
    pub picker_enable_upload: bool,
    pub picker_initial_path: Option<String>,
    pub picker_remembers_last_visited: bool,
    pub picker_root_path: Option<String>,
    pub picker_selectable_node_types: Option<String>,
    /// Whether `parameter` holds a path relative to the channel root.
    pub relative: bool,
    pub root: Option<String>,
}

impl ManageContentButton {
    /// The non-empty picker settings, keyed by their authoring names.
    fn entries(&self) -> Map<String, Value> {
        let text = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|value| !value.is_empty())
                .map(|value| Value::String(value.to_string()))
        };
        let flag = |value: bool, as_string: bool| match (value, as_string) {
            (false, _) => None,
            (true, true) => Some(Value::String("true".to_string())),
            (true, false) => Some(Value::Bool(true)),
        };

        [
            ("defaultPath", text(&self.path)),
            ("documentTemplateQuery", text(&self.document_template_query)),
            ("folderTemplateQuery", text(&self.folder_template_query)),
            ("rootPath", text(&self.root)),
            ("parameterName", text(&self.parameter)),
            ("parameterValueIsRelativePath", flag(self.relative, true)),
            ("pickerEnableUpload", flag(self.picker_enable_upload, false)),
            ("pickerConfiguration", text(&self.picker_configuration)),
            ("pickerInitialPath", text(&self.picker_initial_path)),
            (
                "pickerRemembersLastVisited",
                flag(self.picker_remembers_last_visited, true),
            ),
            ("pickerRootPath", text(&self.picker_root_path)),
            (
                "pickerSelectableNodeTypes",
                text(&self.picker_selectable_node_types),
            ),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key.to_string(), value)))
        .collect()
    }
}

/// Arguments of [`ButtonFactory::create`].
#[derive(Debug, Clone)]
pub enum ButtonParams {
    ManageContent(ManageContentButton),
    /// A hydrated menu (Page Model API 1.0).
    ManageMenu(Arc<Content>),
    /// A raw menu model carrying `_meta` (Page Model API 0.9).
    ManageMenuModel(Value),
}

/// What a button builder produces.
#[derive(Debug)]
pub enum ButtonMeta {
    Collection(Arc<MetaCollection>),
    Model(MetaCollectionModel),
}

pub fn create_manage_content_button(params: &ButtonParams) -> Result<ButtonMeta, SpaError> {
    let ButtonParams::ManageContent(params) = params else {
        return Err(SpaError::InvalidButtonParams(TYPE_MANAGE_CONTENT_BUTTON.to_string()));
    };

    let meta = params.content.as_ref().and_then(|content| content.meta());
    let entries = params.entries();

    if entries.is_empty() {
        return Ok(match meta {
            Some(meta) => ButtonMeta::Collection(Arc::clone(meta)),
            None => ButtonMeta::Model(MetaCollectionModel::default()),
        });
    }

    let Some(meta) = meta else {
        let mut payload = Map::new();
        payload.insert("HST-Type".to_string(), json!(TYPE_MANAGE_CONTENT_BUTTON));
        payload.extend(entries);
        return Ok(ButtonMeta::Model(MetaCollectionModel {
            begin_node_span: vec![MetaModel::comment(Value::Object(payload).to_string())],
            end_node_span: Vec::new(),
        }));
    };

    let merge = |position: MetaPosition| -> Result<Vec<MetaModel>, SpaError> {
        meta.iter()
            .filter(|item| item.position() == position)
            .map(|item| {
                let mut data: Value = serde_json::from_str(item.data())?;
                let object = data.as_object_mut().ok_or_else(|| {
                    SpaError::Decode(format!("meta-data is not an object: {}", item.data()))
                })?;
                object.extend(entries.clone());
                Ok::<_, SpaError>(MetaModel::comment(data.to_string()))
            })
            .collect()
    };

    Ok(ButtonMeta::Model(MetaCollectionModel {
        begin_node_span: merge(MetaPosition::Begin)?,
        end_node_span: merge(MetaPosition::End)?,
    }))
}

pub fn create_manage_menu_button(params: &ButtonParams) -> Result<ButtonMeta, SpaError> {
    match params {
        ButtonParams::ManageMenu(menu) => Ok(match menu.meta() {
            Some(meta) => ButtonMeta::Collection(Arc::clone(meta)),
            None => ButtonMeta::Model(MetaCollectionModel::default()),
        }),
        ButtonParams::ManageMenuModel(model) => Ok(ButtonMeta::Model(match model.get("_meta") {
            Some(meta) => MetaCollectionModel::from_value(meta)?,
            None => MetaCollectionModel::default(),
        })),
        ButtonParams::ManageContent(_) => Err(SpaError::InvalidButtonParams(
            TYPE_MANAGE_MENU_BUTTON.to_string(),
        )),
    }
}

type ButtonBuilder = dyn Fn(&ButtonParams) -> Result<ButtonMeta, SpaError> + Send + Sync;

/// Builds button meta-data by button type.
pub struct ButtonFactory {
    factory: SimpleFactory<ButtonBuilder>,
    meta: Arc<MetaFactory>,
}

impl ButtonFactory {
    pub fn new(meta: Arc<MetaFactory>) -> Self {
        ButtonFactory {
            factory: SimpleFactory::new("button"),
            meta,
        }
    }

    /// The factory with both authoring buttons registered.
    pub fn with_defaults(meta: Arc<MetaFactory>) -> Self {
        Self::new(meta)
            .register(TYPE_MANAGE_CONTENT_BUTTON, create_manage_content_button)
            .register(TYPE_MANAGE_MENU_BUTTON, create_manage_menu_button)
    }

    pub fn register<F>(mut self, button_type: &str, builder: F) -> Self
    where
        F: Fn(&ButtonParams) -> Result<ButtonMeta, SpaError> + Send + Sync + 'static,
    {
        self.factory = self.factory.register(button_type, Box::new(builder));
        self
    }

    pub fn create(
        &self,
        button_type: &str,
        params: &ButtonParams,
    ) -> Result<Arc<MetaCollection>, SpaError> {
        let builder = self.factory.get(button_type)?;
        match builder(params)? {
            ButtonMeta::Collection(collection) => Ok(collection),
            ButtonMeta::Model(model) => Ok(Arc::new(self.meta.create_collection(model)?)),
        }
    }
}

impl fmt::Debug for ButtonFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ButtonFactory")
            .field("factory", &self.factory)
            .finish()
    }
}
