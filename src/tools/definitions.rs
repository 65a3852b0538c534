//! Static registry of every tool the server can expose.
//!
//! The registry carries what the MCP layer needs to advertise a tool (title,
//! description, hints) and what it needs to decide whether to advertise it at
//! all (feature group, required API key scopes).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Annotations {
    pub read_only: bool,
    pub destructive: bool,
    pub idempotent: bool,
    pub open_world: bool,
}

const READ: Annotations = Annotations {
    read_only: true,
    destructive: false,
    idempotent: true,
    open_world: true,
};

const WRITE: Annotations = Annotations {
    read_only: false,
    destructive: false,
    idempotent: true,
    open_world: true,
};

const CREATE: Annotations = Annotations {
    read_only: false,
    destructive: false,
    idempotent: false,
    open_world: true,
};

const DELETE: Annotations = Annotations {
    read_only: false,
    destructive: true,
    idempotent: true,
    open_world: true,
};

#[derive(Debug, Clone, Copy)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub feature: &'static str,
    pub required_scopes: &'static [&'static str],
    pub annotations: Annotations,
}

pub const DOCS_SEARCH: &str = "docs-search";

pub static TOOL_DEFINITIONS: &[ToolDefinition] = &[
    // workspace
    ToolDefinition {
        name: "organizations-get",
        title: "Get organizations",
        description: "Get the organizations the user has access to.",
        feature: "workspace",
        required_scopes: &["organization:read"],
        annotations: READ,
    },
    ToolDefinition {
        name: "switch-organization",
        title: "Switch active organization",
        description: "Change the active organization from the default organization. You should only use this tool if the user asks you to change the organization - otherwise, the default organization will be used.",
        feature: "workspace",
        required_scopes: &["organization:read"],
        annotations: WRITE,
    },
    ToolDefinition {
        name: "organization-details-get",
        title: "Get organization details",
        description: "Get the details of the active organization.",
        feature: "workspace",
        required_scopes: &["organization:read"],
        annotations: READ,
    },
    ToolDefinition {
        name: "projects-get",
        title: "Get projects",
        description: "Fetches projects that the user has access to in the current organization.",
        feature: "workspace",
        required_scopes: &["project:read"],
        annotations: READ,
    },
    ToolDefinition {
        name: "switch-project",
        title: "Switch active project",
        description: "Change the active project from the default project. You should only use this tool if the user asks you to change the project - otherwise, the default project will be used.",
        feature: "workspace",
        required_scopes: &["project:read"],
        annotations: WRITE,
    },
    ToolDefinition {
        name: "event-definitions-list",
        title: "List event definitions",
        description: "List all event definitions in the project with optional filtering. Can filter by search term.",
        feature: "workspace",
        required_scopes: &["event_definition:read"],
        annotations: READ,
    },
    ToolDefinition {
        name: "properties-list",
        title: "Get event properties",
        description: "Get the non-core properties seen on a given event. Use this to find properties to filter or break down insights by.",
        feature: "workspace",
        required_scopes: &["property_definition:read"],
        annotations: READ,
    },
    // flags
    ToolDefinition {
        name: "feature-flag-get-all",
        title: "Get all feature flags",
        description: "Get all feature flags in the project.",
        feature: "flags",
        required_scopes: &["feature_flag:read"],
        annotations: READ,
    },
    ToolDefinition {
        name: "feature-flag-get-definition",
        title: "Get feature flag definition",
        description: "Get the definition of a feature flag. You can provide either the flagId or the flagKey. If you provide both, the flagId will be used.",
        feature: "flags",
        required_scopes: &["feature_flag:read"],
        annotations: READ,
    },
    ToolDefinition {
        name: "create-feature-flag",
        title: "Create feature flag",
        description: "Creates a new feature flag in the project. Once you have created a feature flag, you should ask the user if they want to add it to their codebase.",
        feature: "flags",
        required_scopes: &["feature_flag:write"],
        annotations: CREATE,
    },
    ToolDefinition {
        name: "update-feature-flag",
        title: "Update feature flag",
        description: "Update a new feature flag in the project. To enable a feature flag, you should make sure it is active and the rollout percentage is set to 100 for the group you want to target. To disable a feature flag, you should make sure it is inactive.",
        feature: "flags",
        required_scopes: &["feature_flag:write"],
        annotations: WRITE,
    },
    ToolDefinition {
        name: "delete-feature-flag",
        title: "Delete feature flag",
        description: "Delete a feature flag in the project.",
        feature: "flags",
        required_scopes: &["feature_flag:write"],
        annotations: DELETE,
    },
    // insights
    ToolDefinition {
        name: "insights-get-all",
        title: "Get all insights",
        description: "Get all saved insights in the project with optional filtering. Can filter by search term.",
        feature: "insights",
        required_scopes: &["insight:read"],
        annotations: READ,
    },
    ToolDefinition {
        name: "insight-get",
        title: "Get insight",
        description: "Get a specific insight by ID or short ID.",
        feature: "insights",
        required_scopes: &["insight:read"],
        annotations: READ,
    },
    ToolDefinition {
        name: "insight-create-from-query",
        title: "Create insight from query",
        description: "Save a query as an insight. Run the query with query-run first to check it returns what the user expects.",
        feature: "insights",
        required_scopes: &["insight:write"],
        annotations: CREATE,
    },
    ToolDefinition {
        name: "insight-update",
        title: "Update insight",
        description: "Update an existing insight by ID or short ID. Can update name, description, filters, and other properties.",
        feature: "insights",
        required_scopes: &["insight:write"],
        annotations: WRITE,
    },
    ToolDefinition {
        name: "insight-delete",
        title: "Delete insight",
        description: "Delete an insight by ID or short ID (soft delete - marks as deleted).",
        feature: "insights",
        required_scopes: &["insight:write"],
        annotations: DELETE,
    },
    ToolDefinition {
        name: "insight-query",
        title: "Query insight",
        description: "Execute a saved insight's query and return its results together with the insight.",
        feature: "insights",
        required_scopes: &["insight:read", "query:read"],
        annotations: READ,
    },
    ToolDefinition {
        name: "query-run",
        title: "Run query",
        description: "Run a trends, funnel or HogQL query and return the results. Use this to preview data before saving an insight.",
        feature: "insights",
        required_scopes: &["query:read"],
        annotations: READ,
    },
    // dashboards
    ToolDefinition {
        name: "dashboards-get-all",
        title: "Get all dashboards",
        description: "Get all dashboards in the project with optional filtering. Can filter by search term.",
        feature: "dashboards",
        required_scopes: &["dashboard:read"],
        annotations: READ,
    },
    ToolDefinition {
        name: "dashboard-get",
        title: "Get dashboard",
        description: "Get a specific dashboard by ID, including the insights on it.",
        feature: "dashboards",
        required_scopes: &["dashboard:read"],
        annotations: READ,
    },
    ToolDefinition {
        name: "dashboard-create",
        title: "Create dashboard",
        description: "Create a new dashboard in the project with a name, description, tags and pinned status.",
        feature: "dashboards",
        required_scopes: &["dashboard:write"],
        annotations: CREATE,
    },
    ToolDefinition {
        name: "dashboard-update",
        title: "Update dashboard",
        description: "Update an existing dashboard by ID. Can update name, description, pinned status or tags.",
        feature: "dashboards",
        required_scopes: &["dashboard:write"],
        annotations: WRITE,
    },
    ToolDefinition {
        name: "dashboard-delete",
        title: "Delete dashboard",
        description: "Delete a dashboard by ID (soft delete - marks as deleted).",
        feature: "dashboards",
        required_scopes: &["dashboard:write"],
        annotations: DELETE,
    },
    ToolDefinition {
        name: "add-insight-to-dashboard",
        title: "Add insight to dashboard",
        description: "Add an existing insight to a dashboard. Requires the insight ID or short ID and the dashboard ID.",
        feature: "dashboards",
        required_scopes: &["dashboard:write", "insight:write"],
        annotations: WRITE,
    },
    // experiments
    ToolDefinition {
        name: "experiment-get-all",
        title: "Get all experiments",
        description: "Get all experiments in the project.",
        feature: "experiments",
        required_scopes: &["experiment:read"],
        annotations: READ,
    },
    ToolDefinition {
        name: "experiment-get",
        title: "Get experiment",
        description: "Get details of a specific experiment by ID.",
        feature: "experiments",
        required_scopes: &["experiment:read"],
        annotations: READ,
    },
    // session replays
    ToolDefinition {
        name: "session-replays-query",
        title: "Query session replays",
        description: "Find session recordings, optionally filtered by a page URL fragment, minimum active time and date range. Returns the most active sessions first.",
        feature: "session-replays",
        required_scopes: &["session_recording:read", "query:read"],
        annotations: READ,
    },
    // llm analytics
    ToolDefinition {
        name: "get-llm-total-costs-for-project",
        title: "Get LLM costs",
        description: "Fetches the total LLM daily costs for each model for a project over a given number of days. If no number of days is provided, it defaults to 7. The results are sorted by model name.",
        feature: "llm-analytics",
        required_scopes: &["query:read"],
        annotations: READ,
    },
    // docs
    ToolDefinition {
        name: DOCS_SEARCH,
        title: "Search docs",
        description: "Use this tool to search the PostHog documentation for information that can help the user with their request. Use it as a fallback when you cannot answer the user's request using other tools in this MCP.",
        feature: "docs",
        required_scopes: &[],
        annotations: READ,
    },
];

pub fn get_tool_definition(name: &str) -> Option<&'static ToolDefinition> {
    TOOL_DEFINITIONS.iter().find(|d| d.name == name)
}

/// Tool names enabled by a feature list. No list (or an empty one) enables
/// everything; unknown feature names match nothing.
pub fn tools_for_features(features: Option<&[String]>) -> Vec<&'static str> {
    match features {
        None | Some([]) => TOOL_DEFINITIONS.iter().map(|d| d.name).collect(),
        Some(features) => TOOL_DEFINITIONS
            .iter()
            .filter(|d| features.iter().any(|f| f == d.feature))
            .map(|d| d.name)
            .collect(),
    }
}

/// Whether `granted` API key scopes cover every scope in `required`.
pub fn has_scopes(granted: &[String], required: &[&str]) -> bool {
    if granted.iter().any(|s| s == "*") {
        return true;
    }
    required.iter().all(|needed| {
        granted.iter().any(|have| {
            if have == needed {
                return true;
            }
            // write access to an object implies read access
            match (needed.strip_suffix(":read"), have.strip_suffix(":write")) {
                (Some(object), Some(granted_object)) => object == granted_object,
                _ => false,
            }
        })
    })
}
