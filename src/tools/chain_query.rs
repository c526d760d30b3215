//! 链上查询工具：把 ChainQuery 能力暴露给撰写节点的模型

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::chain::ChainQuery;
use crate::tools::Tool;

pub const CHAIN_QUERY_TOOL: &str = "query_aptos_chain";

pub struct ChainQueryTool {
    chain: Arc<dyn ChainQuery>,
}

impl ChainQueryTool {
    pub fn new(chain: Arc<dyn ChainQuery>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl Tool for ChainQueryTool {
    fn name(&self) -> &str {
        CHAIN_QUERY_TOOL
    }

    fn description(&self) -> &str {
        "Read-only Aptos blockchain query. Resource identifiers: \"ledger\", \"account/<addr>\", \
         \"resources/<addr>\", \"resource/<addr>/<move_type>\". Returns JSON."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "resource": {
                    "type": "string",
                    "description": "Resource identifier, e.g. account/0x1"
                }
            },
            "required": ["resource"]
        })
    }

    fn error_kind(&self) -> &'static str {
        "query_error"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let resource = args
            .get("resource")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing required string argument 'resource'".to_string())?;
        let data = self.chain.query(resource).await.map_err(|e| e.to_string())?;
        Ok(data.to_string())
    }
}
