use derive_more::Deref;
use serde_json::{Map, Value};

use super::{Client, HttpResponse};
use crate::errors::RvError;

#[derive(Deref)]
pub struct Logical<'a> {
    #[deref]
    pub client: &'a Client,
}

impl Client {
    pub fn logical(&self) -> Logical {
        Logical { client: self }
    }
}

impl Logical<'_> {
    pub fn write(&self, path: &str, data: Option<Map<String, Value>>) -> Result<HttpResponse, RvError> {
        self.request_write(&format!("/v1/{path}"), data)
    }
}
