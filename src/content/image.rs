use serde_json::Value;

use super::{text, ContentContext};

/// One rendition of an image set.
#[derive(Debug, Clone)]
pub struct Image {
    model: Value,
    url: Option<String>,
}

impl Image {
    pub fn new(model: &Value, context: &ContentContext<'_>) -> Self {
        Image {
            url: context.url(model, "/links/site"),
            model: model.clone(),
        }
    }

    pub fn display_name(&self) -> Option<&str> {
        text(&self.model, "/displayName")
    }

    pub fn file_name(&self) -> Option<&str> {
        text(&self.model, "/fileName")
    }

    pub fn height(&self) -> Option<u64> {
        self.model.get("height").and_then(Value::as_u64)
    }

    pub fn width(&self) -> Option<u64> {
        self.model.get("width").and_then(Value::as_u64)
    }

    pub fn mime_type(&self) -> Option<&str> {
        text(&self.model, "/mimeType")
    }

    pub fn name(&self) -> Option<&str> {
        text(&self.model, "/name")
    }

    pub fn size(&self) -> Option<u64> {
        self.model.get("size").and_then(Value::as_u64)
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

#[derive(Debug)]
pub struct ImageSet {
    model: Value,
    original: Option<Image>,
    thumbnail: Option<Image>,
}

impl ImageSet {
    pub fn new(model: &Value, context: &ContentContext<'_>) -> Self {
        let image = |key: &str| {
            model
                .pointer(key)
                .filter(|image| image.is_object())
                .map(|image| Image::new(image, context))
        };

        ImageSet {
            original: image("/data/original"),
            thumbnail: image("/data/thumbnail"),
            model: model.clone(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        text(&self.model, "/data/id")
    }

    pub fn name(&self) -> Option<&str> {
        text(&self.model, "/data/name")
    }

    pub fn display_name(&self) -> Option<&str> {
        text(&self.model, "/data/displayName")
    }

    pub fn file_name(&self) -> Option<&str> {
        text(&self.model, "/data/fileName")
    }

    pub fn description(&self) -> Option<&str> {
        text(&self.model, "/data/description")
    }

    pub fn locale(&self) -> Option<&str> {
        text(&self.model, "/data/localeString")
    }

    pub fn original(&self) -> Option<&Image> {
        self.original.as_ref()
    }

    pub fn thumbnail(&self) -> Option<&Image> {
        self.thumbnail.as_ref()
    }
}
