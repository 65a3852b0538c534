//! MCP server exposing the PostHog tools.
//!
//! `Tools` is the rmcp router over every handler in [`crate::tools`].
//! `PostHogMcp` wraps it per session: it binds the session to the caller's
//! credential, hides tools the configuration or the API key does not allow,
//! and applies registry titles, descriptions and hints to what is listed.
//!
//! Tool parameters must be wrapped in `Parameters<T>` for `#[tool_router]`
//! to accept them; plain structs fail with an opaque `IntoToolRoute` error.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, request::Parts};
use rmcp::{
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    service::RequestContext,
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::cache::Scope;
use crate::config::Config;
use crate::context::{Context, StateBacking};
use crate::tools::definitions::{
    get_tool_definition, has_scopes, tools_for_features, ToolDefinition, DOCS_SEARCH,
};
use crate::tools::{
    dashboards, docs, experiments, flags, insights, llm, render, session_replays, workspace,
    ToolResult,
};

pub const INSTRUCTIONS: &str = "
- You are a helpful assistant that can query PostHog API.
- If some resource from another tool is not found, ask the user if they want to try finding it in another project.
- If you cannot answer the user's PostHog related request or question using other available tools in this MCP, use the 'docs-search' tool to provide information from the documentation to guide user how they can do it themselves - when doing so provide condensed instructions with links to sources.
";

// ─── Session ─────────────────────────────────────────────────────────────────

/// One MCP session. Bound to a single credential on first use.
struct Session {
    config: Arc<Config>,
    backing: StateBacking,
    context: OnceCell<Arc<Context>>,
}

impl Session {
    async fn bind(&self, token: &str) -> Result<Arc<Context>, String> {
        let ctx = self
            .context
            .get_or_try_init(|| async {
                Context::new(token, self.config.clone(), &self.backing)
                    .await
                    .map(Arc::new)
            })
            .await
            .map_err(|e| format!("Failed to initialize session: {}", e))?;

        let scope = Scope::from_token(token).map_err(|e| e.to_string())?;
        if ctx.cache.scope() != &scope {
            warn!(scope = %ctx.cache.scope(), "credential changed mid-session");
            return Err("This session is bound to a different API token".to_string());
        }
        Ok(ctx.clone())
    }

    fn token(&self, context: &RequestContext<RoleServer>) -> Option<String> {
        context
            .extensions
            .get::<Parts>()
            .and_then(|parts| parts.headers.get(AUTHORIZATION))
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .map(str::to_string)
            .or_else(|| self.config.api_token.clone())
    }
}

/// Token part of an `Authorization` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .split_once(' ')
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty())
}

/// Tools the configuration and the granted API key scopes allow.
pub fn enabled_tools(config: &Config, granted_scopes: &[String]) -> HashSet<&'static str> {
    tools_for_features(Some(config.features.as_slice()))
        .into_iter()
        .filter(|name| *name != DOCS_SEARCH || config.docs_search_enabled())
        .filter_map(get_tool_definition)
        .filter(|def| has_scopes(granted_scopes, def.required_scopes))
        .map(|def| def.name)
        .collect()
}

fn decorate(tool: &mut Tool, def: &ToolDefinition) {
    tool.title = Some(def.title.to_string());
    tool.description = Some(Cow::Borrowed(def.description));
    tool.annotations = Some(ToolAnnotations {
        title: Some(def.title.to_string()),
        read_only_hint: Some(def.annotations.read_only),
        destructive_hint: Some(def.annotations.destructive),
        idempotent_hint: Some(def.annotations.idempotent),
        open_world_hint: Some(def.annotations.open_world),
    });
}

// ─── Tools ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct Tools {
    tool_router: ToolRouter<Self>,
    session: Arc<Session>,
}

impl Tools {
    fn context(&self) -> Result<Arc<Context>, McpError> {
        self.session
            .context
            .get()
            .cloned()
            .ok_or_else(|| McpError::internal_error("session is not bound to a credential", None))
    }

    fn tool_error(msg: impl Into<String>) -> CallToolResult {
        let mut result = CallToolResult::success(vec![Content::text(msg.into())]);
        result.is_error = Some(true);
        result
    }

    fn respond(result: ToolResult) -> CallToolResult {
        match result {
            Ok(value) => CallToolResult::success(vec![Content::text(render(&value))]),
            Err(e) => Self::tool_error(format!("Error: {}", e)),
        }
    }
}

#[tool_router]
impl Tools {
    fn new(session: Arc<Session>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            session,
        }
    }

    // workspace

    #[tool(name = "organizations-get")]
    async fn organizations_get(&self) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(workspace::organizations_get(&ctx).await))
    }

    #[tool(name = "switch-organization")]
    async fn switch_organization(
        &self,
        Parameters(p): Parameters<workspace::SwitchOrganizationParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(workspace::switch_organization(&ctx, p).await))
    }

    #[tool(name = "organization-details-get")]
    async fn organization_details_get(&self) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(workspace::organization_details_get(&ctx).await))
    }

    #[tool(name = "projects-get")]
    async fn projects_get(&self) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(workspace::projects_get(&ctx).await))
    }

    #[tool(name = "switch-project")]
    async fn switch_project(
        &self,
        Parameters(p): Parameters<workspace::SwitchProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(workspace::switch_project(&ctx, p).await))
    }

    #[tool(name = "event-definitions-list")]
    async fn event_definitions_list(
        &self,
        Parameters(p): Parameters<workspace::EventDefinitionsParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(workspace::event_definitions_list(&ctx, p).await))
    }

    #[tool(name = "properties-list")]
    async fn properties_list(
        &self,
        Parameters(p): Parameters<workspace::PropertiesParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(workspace::properties_list(&ctx, p).await))
    }

    // flags

    #[tool(name = "feature-flag-get-all")]
    async fn feature_flag_get_all(&self) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(flags::get_all(&ctx).await))
    }

    #[tool(name = "feature-flag-get-definition")]
    async fn feature_flag_get_definition(
        &self,
        Parameters(p): Parameters<flags::GetDefinitionParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(flags::get_definition(&ctx, p).await))
    }

    #[tool(name = "create-feature-flag")]
    async fn create_feature_flag(
        &self,
        Parameters(p): Parameters<flags::CreateFlagParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(flags::create(&ctx, p).await))
    }

    #[tool(name = "update-feature-flag")]
    async fn update_feature_flag(
        &self,
        Parameters(p): Parameters<flags::UpdateFlagParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(flags::update(&ctx, p).await))
    }

    #[tool(name = "delete-feature-flag")]
    async fn delete_feature_flag(
        &self,
        Parameters(p): Parameters<flags::DeleteFlagParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(flags::delete(&ctx, p).await))
    }

    // insights

    #[tool(name = "insights-get-all")]
    async fn insights_get_all(
        &self,
        Parameters(p): Parameters<insights::GetAllParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(insights::get_all(&ctx, p).await))
    }

    #[tool(name = "insight-get")]
    async fn insight_get(
        &self,
        Parameters(p): Parameters<insights::InsightIdParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(insights::get(&ctx, p).await))
    }

    #[tool(name = "insight-create-from-query")]
    async fn insight_create_from_query(
        &self,
        Parameters(p): Parameters<insights::CreateParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(insights::create_from_query(&ctx, p).await))
    }

    #[tool(name = "insight-update")]
    async fn insight_update(
        &self,
        Parameters(p): Parameters<insights::UpdateParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(insights::update(&ctx, p).await))
    }

    #[tool(name = "insight-delete")]
    async fn insight_delete(
        &self,
        Parameters(p): Parameters<insights::InsightIdParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(insights::delete(&ctx, p).await))
    }

    #[tool(name = "insight-query")]
    async fn insight_query(
        &self,
        Parameters(p): Parameters<insights::InsightIdParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(insights::query(&ctx, p).await))
    }

    #[tool(name = "query-run")]
    async fn query_run(
        &self,
        Parameters(p): Parameters<insights::QueryRunParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(insights::query_run(&ctx, p).await))
    }

    // dashboards

    #[tool(name = "dashboards-get-all")]
    async fn dashboards_get_all(
        &self,
        Parameters(p): Parameters<dashboards::GetAllParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(dashboards::get_all(&ctx, p).await))
    }

    #[tool(name = "dashboard-get")]
    async fn dashboard_get(
        &self,
        Parameters(p): Parameters<dashboards::DashboardIdParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(dashboards::get(&ctx, p).await))
    }

    #[tool(name = "dashboard-create")]
    async fn dashboard_create(
        &self,
        Parameters(p): Parameters<dashboards::CreateParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(dashboards::create(&ctx, p).await))
    }

    #[tool(name = "dashboard-update")]
    async fn dashboard_update(
        &self,
        Parameters(p): Parameters<dashboards::UpdateParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(dashboards::update(&ctx, p).await))
    }

    #[tool(name = "dashboard-delete")]
    async fn dashboard_delete(
        &self,
        Parameters(p): Parameters<dashboards::DashboardIdParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(dashboards::delete(&ctx, p).await))
    }

    #[tool(name = "add-insight-to-dashboard")]
    async fn add_insight_to_dashboard(
        &self,
        Parameters(p): Parameters<dashboards::AddInsightParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(dashboards::add_insight(&ctx, p).await))
    }

    // experiments

    #[tool(name = "experiment-get-all")]
    async fn experiment_get_all(&self) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(experiments::get_all(&ctx).await))
    }

    #[tool(name = "experiment-get")]
    async fn experiment_get(
        &self,
        Parameters(p): Parameters<experiments::GetParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(experiments::get(&ctx, p).await))
    }

    // session replays, llm analytics, docs

    #[tool(name = "session-replays-query")]
    async fn session_replays_query(
        &self,
        Parameters(p): Parameters<session_replays::QueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(session_replays::query(&ctx, p).await))
    }

    #[tool(name = "get-llm-total-costs-for-project")]
    async fn get_llm_total_costs_for_project(
        &self,
        Parameters(p): Parameters<llm::CostsParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(llm::total_costs(&ctx, p).await))
    }

    #[tool(name = "docs-search")]
    async fn docs_search(
        &self,
        Parameters(p): Parameters<docs::SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = self.context()?;
        Ok(Self::respond(docs::search(&ctx, p).await))
    }
}

#[tool_handler]
impl ServerHandler for Tools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// ─── ServerHandler ───────────────────────────────────────────────────────────

/// Per-session wrapper: credential binding, tool filtering and metadata.
pub struct PostHogMcp {
    inner: Tools,
}

impl PostHogMcp {
    pub fn new(config: Arc<Config>, backing: StateBacking) -> Self {
        let session = Arc::new(Session {
            config,
            backing,
            context: OnceCell::new(),
        });
        Self {
            inner: Tools::new(session),
        }
    }

    async fn bind(&self, context: &RequestContext<RoleServer>) -> Result<Arc<Context>, String> {
        let session = &self.inner.session;
        let token = session
            .token(context)
            .ok_or_else(|| "No API token provided".to_string())?;
        session.bind(&token).await
    }

    async fn allowed(&self, ctx: &Context) -> Result<HashSet<&'static str>, String> {
        let key = ctx.state.get_api_key().await.map_err(|e| e.to_string())?;
        Ok(enabled_tools(&ctx.config, &key.scopes))
    }
}

impl ServerHandler for PostHogMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        request: Option<PaginatedRequestParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let ctx = self
            .bind(&context)
            .await
            .map_err(|msg| McpError::invalid_request(msg, None))?;
        let allowed = self
            .allowed(&ctx)
            .await
            .map_err(|msg| McpError::internal_error(msg, None))?;

        let mut result = self.inner.list_tools(request, context).await?;
        result.tools.retain(|t| allowed.contains(t.name.as_ref()));
        for tool in result.tools.iter_mut() {
            if let Some(def) = get_tool_definition(tool.name.as_ref()) {
                decorate(tool, def);
            }
        }
        Ok(result)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = match self.bind(&context).await {
            Ok(ctx) => ctx,
            Err(msg) => return Ok(Tools::tool_error(format!("Error: {}", msg))),
        };
        let allowed = match self.allowed(&ctx).await {
            Ok(allowed) => allowed,
            Err(msg) => return Ok(Tools::tool_error(format!("Error: {}", msg))),
        };
        if !allowed.contains(request.name.as_ref()) {
            return Ok(Tools::tool_error(format!(
                "Error: Tool '{}' is not available for this API key or configuration",
                request.name
            )));
        }

        info!(scope = %ctx.cache.scope(), tool = %request.name, "tool call");
        self.inner.call_tool(request, context).await
    }
}

// ─── Entry Point ─────────────────────────────────────────────────────────────

/// Serve a single session over stdin/stdout using the configured token.
pub async fn run_stdio(config: Arc<Config>, backing: StateBacking) -> Result<(), String> {
    if config.api_token.as_deref().map_or(true, str::is_empty) {
        return Err("POSTHOG_PERSONAL_API_KEY is required for the stdio transport".to_string());
    }
    let server = PostHogMcp::new(config, backing);

    let service = server
        .serve(stdio())
        .await
        .map_err(|e| format!("MCP server error: {}", e))?;
    service
        .waiting()
        .await
        .map_err(|e| format!("MCP server terminated: {}", e))?;
    Ok(())
}
