// src/tools/schema.rs

//! The tool table. Each tool is plain data: a name, a description and its
//! parameters. The dispatcher validates arguments against it before anything
//! touches the chain, and `tools/list` publishes it as JSON schema.

use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    fn label(self) -> &'static str {
        match self {
            ParamType::String => "a string",
            ParamType::Number => "a number",
            ParamType::Boolean => "a boolean",
            ParamType::Array => "an array",
            ParamType::Object => "an object",
        }
    }
}

/// Whether a tool mutates chain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Write,
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: &'static str,
    pub items: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: true,
            default: None,
            description,
            items: None,
        }
    }

    pub fn optional(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty, description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_items(mut self, items: Value) -> Self {
        self.items = Some(items);
        self
    }

    fn schema(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".into(), json!(self.ty));
        prop.insert("description".into(), json!(self.description));
        if let Some(items) = &self.items {
            prop.insert("items".into(), items.clone());
        }
        if let Some(default) = &self.default {
            prop.insert("default".into(), default.clone());
        }
        Value::Object(prop)
    }

    /// Coerces a supplied value to the declared type where the intent is
    /// unambiguous (`1.5` for a string amount, `"0.02"` for a number).
    fn coerce(&self, value: Value) -> Result<Value, String> {
        let mismatch = || format!("argument '{}' must be {}", self.name, self.ty.label());
        match (self.ty, value) {
            (ParamType::String, Value::String(s)) => Ok(Value::String(s)),
            (ParamType::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (ParamType::Number, Value::Number(n)) => Ok(Value::Number(n)),
            (ParamType::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(mismatch),
            (ParamType::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
            (ParamType::Boolean, Value::String(s)) if s == "true" || s == "false" => {
                Ok(Value::Bool(s == "true"))
            }
            (ParamType::Array, Value::Array(a)) => Ok(Value::Array(a)),
            (ParamType::Object, Value::Object(o)) => Ok(Value::Object(o)),
            _ => Err(mismatch()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: OperationKind,
    pub params: Vec<ParamSpec>,
}

impl ToolDescriptor {
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.to_string(), p.schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
            "annotations": { "readOnlyHint": self.kind == OperationKind::Read },
        })
    }

    /// Checks `args` against the parameter table, filling defaults and
    /// coercing types. Returns the normalized argument object.
    pub fn validate(&self, args: &Value) -> Result<Value, String> {
        let supplied = match args {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            _ => return Err("arguments must be a JSON object".to_string()),
        };

        let mut out = Map::new();
        for param in &self.params {
            match supplied.get(param.name).cloned() {
                Some(Value::Null) | None => {
                    if param.required {
                        return Err(format!("missing required argument '{}'", param.name));
                    }
                    if let Some(default) = &param.default {
                        out.insert(param.name.to_string(), default.clone());
                    }
                }
                Some(value) => {
                    out.insert(param.name.to_string(), param.coerce(value)?);
                }
            }
        }
        Ok(Value::Object(out))
    }
}

/// Read-only after construction; owned by the dispatcher.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name).collect()
    }

    pub fn standard() -> Self {
        use OperationKind::{Read, Write};
        use ParamType::{Array, Boolean, Number, String as Text};

        const TOKEN: &str = "Token symbol (ETH, WETH, USDC, USDT, DAI, WBTC) or contract address";
        const GAS_TOKEN: &str =
            "Symbol or address of the token to pay gas in. Defaults to the native fee token.";
        const ENTRYPOINT: &str =
            "Function signature, e.g. 'balanceOf(address) returns (uint256)'";

        let calldata = || {
            ParamSpec::optional("calldata", Array, "Function arguments in signature order")
                .with_default(json!([]))
        };

        Self::new(vec![
            ToolDescriptor {
                name: "get_balance",
                description: "Get token balance for an address. Supports registered symbols or any token address.",
                kind: Read,
                params: vec![
                    ParamSpec::required("token", Text, TOKEN),
                    ParamSpec::optional(
                        "address",
                        Text,
                        "The address to check balance for (defaults to the agent's account)",
                    ),
                ],
            },
            ToolDescriptor {
                name: "transfer",
                description: "Transfer tokens to another address",
                kind: Write,
                params: vec![
                    ParamSpec::required("recipient", Text, "Recipient address (must start with 0x)"),
                    ParamSpec::required("token", Text, TOKEN),
                    ParamSpec::required(
                        "amount",
                        Text,
                        "Amount in human-readable format (e.g. '1.5' for 1.5 tokens)",
                    ),
                    ParamSpec::optional("gasToken", Text, GAS_TOKEN),
                ],
            },
            ToolDescriptor {
                name: "call_contract",
                description: "Call a read-only contract function",
                kind: Read,
                params: vec![
                    ParamSpec::required("contractAddress", Text, "Contract address"),
                    ParamSpec::required("entrypoint", Text, ENTRYPOINT),
                    calldata(),
                ],
            },
            ToolDescriptor {
                name: "invoke_contract",
                description: "Invoke a state-changing contract function",
                kind: Write,
                params: vec![
                    ParamSpec::required("contractAddress", Text, "Contract address"),
                    ParamSpec::required("entrypoint", Text, ENTRYPOINT),
                    calldata(),
                    ParamSpec::optional("gasToken", Text, GAS_TOKEN),
                ],
            },
            ToolDescriptor {
                name: "swap",
                description: "Execute a token swap through the aggregator at the best quoted price. Supports gasless mode where gas is paid in the sell token.",
                kind: Write,
                params: vec![
                    ParamSpec::required("sellToken", Text, "Token to sell (symbol or address)"),
                    ParamSpec::required("buyToken", Text, "Token to buy (symbol or address)"),
                    ParamSpec::required("amount", Text, "Amount to sell in human-readable format"),
                    ParamSpec::optional("slippage", Number, "Maximum slippage tolerance (0.01 = 1%)")
                        .with_default(json!(0.01)),
                    ParamSpec::optional("gasless", Boolean, "Pay gas in the sell token")
                        .with_default(json!(false)),
                ],
            },
            ToolDescriptor {
                name: "get_quote",
                description: "Get a swap quote without executing the trade",
                kind: Read,
                params: vec![
                    ParamSpec::required("sellToken", Text, "Token to sell (symbol or address)"),
                    ParamSpec::required("buyToken", Text, "Token to buy (symbol or address)"),
                    ParamSpec::required("amount", Text, "Amount to sell in human-readable format"),
                ],
            },
            ToolDescriptor {
                name: "estimate_fee",
                description: "Estimate the transaction fee for a contract call",
                kind: Read,
                params: vec![
                    ParamSpec::required("contractAddress", Text, "Contract address"),
                    ParamSpec::required("entrypoint", Text, ENTRYPOINT),
                    calldata(),
                ],
            },
            ToolDescriptor {
                name: "deploy_contract",
                description: "Deploy a contract through the deterministic deployer",
                kind: Write,
                params: vec![
                    ParamSpec::required("bytecode", Text, "0x-prefixed creation bytecode"),
                    ParamSpec::optional("constructorTypes", Array, "Constructor parameter types, e.g. ['address','uint256']")
                        .with_items(json!({"type": "string"}))
                        .with_default(json!([])),
                    ParamSpec::optional("constructorCalldata", Array, "Constructor arguments")
                        .with_default(json!([])),
                    ParamSpec::optional("salt", Text, "0x-prefixed salt (random when omitted)"),
                    ParamSpec::optional("gasToken", Text, GAS_TOKEN),
                ],
            },
            ToolDescriptor {
                name: "register_agent",
                description: "Register the agent identity on-chain (ERC-8004).",
                kind: Write,
                params: vec![
                    ParamSpec::required("tokenUri", Text, "IPFS URI or URL containing agent metadata/avatar"),
                    ParamSpec::optional("metadata", Array, "Optional key-value metadata to store on-chain")
                        .with_items(json!({
                            "type": "object",
                            "properties": {"key": {"type": "string"}, "value": {"type": "string"}},
                            "required": ["key", "value"]
                        }))
                        .with_default(json!([])),
                    ParamSpec::optional("gasToken", Text, GAS_TOKEN),
                ],
            },
            ToolDescriptor {
                name: "get_agent_info",
                description: "Get registry information for an agent",
                kind: Read,
                params: vec![
                    ParamSpec::required("agentId", Text, "The agent id (token id) to query"),
                    ParamSpec::optional("keys", Array, "Metadata keys to fetch (e.g. ['agentName', 'version'])")
                        .with_items(json!({"type": "string"}))
                        .with_default(json!([])),
                ],
            },
        ])
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
