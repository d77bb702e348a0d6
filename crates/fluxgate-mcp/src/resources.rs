//! Static Flux query resources
//!
//! Nine canned query templates addressable as `flux://queries/<slug>`.
//! They are documentation artifacts: returned verbatim, never parameterized
//! or executed server-side.

use serde::Serialize;

const URI_PREFIX: &str = "flux://queries/";

/// A static Flux resource exposed through the MCP surface
#[derive(Debug, Clone, Serialize)]
pub struct FluxResource {
    /// Stable identifier, `flux://queries/<slug>`
    pub uri: &'static str,
    /// Short human-readable title
    pub title: &'static str,
    /// What the template demonstrates
    pub description: &'static str,
    /// Content MIME type
    pub mime_type: &'static str,
    /// The Flux query text, verbatim
    pub content: &'static str,
}

/// Immutable catalog of static resources, built once at startup
pub struct ResourceCatalog {
    resources: Vec<FluxResource>,
}

impl ResourceCatalog {
    /// All resources in catalog order
    pub fn list(&self) -> &[FluxResource] {
        &self.resources
    }

    /// Look up a resource by full URI or bare slug
    pub fn get(&self, id: &str) -> Option<&FluxResource> {
        self.resources
            .iter()
            .find(|r| r.uri == id || r.uri.strip_prefix(URI_PREFIX) == Some(id))
    }
}

/// Create the catalog of canned Flux query templates
pub fn create_resource_catalog() -> ResourceCatalog {
    let resources = vec![
        FluxResource {
            uri: "flux://queries/list-buckets",
            title: "List buckets",
            description: "List every bucket visible to the current token.",
            mime_type: "application/vnd.flux",
            content: "buckets()\n",
        },
        FluxResource {
            uri: "flux://queries/list-measurements",
            title: "List measurements",
            description: "List the measurements present in a bucket.",
            mime_type: "application/vnd.flux",
            content: "import \"influxdata/influxdb/schema\"\n\nschema.measurements(bucket: \"example-bucket\")\n",
        },
        FluxResource {
            uri: "flux://queries/list-fields",
            title: "List field keys",
            description: "List the field keys of one measurement.",
            mime_type: "application/vnd.flux",
            content: "import \"influxdata/influxdb/schema\"\n\nschema.fieldKeys(\n    bucket: \"example-bucket\",\n    predicate: (r) => r._measurement == \"cpu\",\n)\n",
        },
        FluxResource {
            uri: "flux://queries/list-tag-values",
            title: "List tag values",
            description: "List the values of one tag key within a measurement.",
            mime_type: "application/vnd.flux",
            content: "import \"influxdata/influxdb/schema\"\n\nschema.tagValues(\n    bucket: \"example-bucket\",\n    tag: \"host\",\n    predicate: (r) => r._measurement == \"cpu\",\n)\n",
        },
        FluxResource {
            uri: "flux://queries/recent-data",
            title: "Recent data",
            description: "The newest rows of a measurement from the last hour.",
            mime_type: "application/vnd.flux",
            content: "from(bucket: \"example-bucket\")\n    |> range(start: -1h)\n    |> filter(fn: (r) => r._measurement == \"cpu\")\n    |> sort(columns: [\"_time\"], desc: true)\n    |> limit(n: 100)\n",
        },
        FluxResource {
            uri: "flux://queries/aggregate-window",
            title: "Windowed aggregation",
            description: "Average a field over five-minute windows.",
            mime_type: "application/vnd.flux",
            content: "from(bucket: \"example-bucket\")\n    |> range(start: -6h)\n    |> filter(fn: (r) => r._measurement == \"cpu\" and r._field == \"usage_user\")\n    |> aggregateWindow(every: 5m, fn: mean, createEmpty: false)\n",
        },
        FluxResource {
            uri: "flux://queries/last-value",
            title: "Last value",
            description: "The most recent value of each series in a measurement.",
            mime_type: "application/vnd.flux",
            content: "from(bucket: \"example-bucket\")\n    |> range(start: -24h)\n    |> filter(fn: (r) => r._measurement == \"cpu\")\n    |> last()\n",
        },
        FluxResource {
            uri: "flux://queries/count-points",
            title: "Count points",
            description: "Count the points recorded per series over a range.",
            mime_type: "application/vnd.flux",
            content: "from(bucket: \"example-bucket\")\n    |> range(start: -24h)\n    |> filter(fn: (r) => r._measurement == \"cpu\")\n    |> count()\n",
        },
        FluxResource {
            uri: "flux://queries/threshold-filter",
            title: "Threshold filter",
            description: "Rows whose value exceeds a fixed threshold.",
            mime_type: "application/vnd.flux",
            content: "from(bucket: \"example-bucket\")\n    |> range(start: -1h)\n    |> filter(fn: (r) => r._measurement == \"cpu\" and r._field == \"usage_user\")\n    |> filter(fn: (r) => r._value > 90.0)\n",
        },
    ];

    ResourceCatalog { resources }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_has_nine_resources() {
        let catalog = create_resource_catalog();
        assert_eq!(catalog.list().len(), 9);
    }

    #[test]
    fn test_uris_are_stable_and_unique() {
        let catalog = create_resource_catalog();
        let mut seen = HashSet::new();
        for resource in catalog.list() {
            assert!(resource.uri.starts_with(URI_PREFIX), "bad uri: {}", resource.uri);
            assert!(seen.insert(resource.uri), "duplicate uri: {}", resource.uri);
            assert!(!resource.content.is_empty());
            assert_eq!(resource.mime_type, "application/vnd.flux");
        }
    }

    #[test]
    fn test_lookup_by_uri_and_slug() {
        let catalog = create_resource_catalog();

        let by_uri = catalog.get("flux://queries/recent-data").unwrap();
        let by_slug = catalog.get("recent-data").unwrap();
        assert_eq!(by_uri.uri, by_slug.uri);
        assert!(by_uri.content.contains("range(start: -1h)"));

        assert!(catalog.get("no-such-template").is_none());
        assert!(catalog.get("flux://queries/no-such-template").is_none());
    }

    #[test]
    fn test_contents_are_verbatim_and_stable() {
        let catalog = create_resource_catalog();
        let first = catalog.get("list-buckets").unwrap().content;
        let second = catalog.get("list-buckets").unwrap().content;
        assert_eq!(first, "buckets()\n");
        assert_eq!(first, second);
    }
}
