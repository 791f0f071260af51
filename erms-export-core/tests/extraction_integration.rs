use std::collections::HashMap;
use std::fs;

use tempfile::tempdir;

use erms_export_core::contract::{
    MockEadValidator, MockProfileStore, MockRepository, NodeKind, RepositoryNode,
    ValidationOutcome,
};
use erms_export_core::dom::{self, Element};
use erms_export_core::extract::{extract, ExtractionError, ExtractionRequest, ExtractionStatus};
use erms_export_core::mapper::MapError;

const RULES: &str = r#"
<mapping>
  <objectTypes>
    <objectType id="erms:series" semanticType="series">
      <hook property="cmis:name" locator="did/unittitle"/>
      <hook property="cmis:objectId" locator="@id"/>
    </objectType>
    <objectType id="erms:file" semanticType="file" leaf="true">
      <hook property="cmis:name" locator="did/unittitle"/>
    </objectType>
  </objectTypes>
  <templates>
    <template semanticType="series">
      <c level="series" id=""><did><unittitle/></did></c>
    </template>
    <template semanticType="file">
      <c level="file"><did><unittitle/></did><dao href="" title=""/></c>
    </template>
    <pointer hrefAttribute="href" titleAttribute="title">
      <dao href="" title=""/>
    </pointer>
  </templates>
</mapping>
"#;

const EAD_TEMPLATE: &str = r#"<ead><archdesc level="fonds"><dsc/></archdesc></ead>"#;

fn folder(id: &str, type_id: &str, name: &str, path: &str) -> RepositoryNode {
    RepositoryNode {
        id: id.to_string(),
        type_id: type_id.to_string(),
        kind: NodeKind::Folder,
        name: name.to_string(),
        path: Some(path.to_string()),
    }
}

fn document(id: &str, name: &str) -> RepositoryNode {
    RepositoryNode {
        id: id.to_string(),
        type_id: "erms:document".to_string(),
        kind: NodeKind::Document,
        name: name.to_string(),
        path: None,
    }
}

/// Builds a deterministic repository mock out of a flat node list, a
/// parent-to-children table, per-node properties and per-node content.
fn mock_repository(
    nodes: Vec<RepositoryNode>,
    children: Vec<(&str, Vec<&str>)>,
    properties: Vec<(&str, &str, &str)>,
    content: Vec<(&str, &[u8])>,
) -> MockRepository {
    let node_map: HashMap<String, RepositoryNode> =
        nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
    let child_map: HashMap<String, Vec<String>> = children
        .into_iter()
        .map(|(id, ids)| {
            (
                id.to_string(),
                ids.into_iter().map(str::to_string).collect(),
            )
        })
        .collect();
    let property_map: HashMap<(String, String), String> = properties
        .into_iter()
        .map(|(id, property, value)| ((id.to_string(), property.to_string()), value.to_string()))
        .collect();
    let content_map: HashMap<String, Vec<u8>> = content
        .into_iter()
        .map(|(id, bytes)| (id.to_string(), bytes.to_vec()))
        .collect();

    let mut repository = MockRepository::new();
    {
        let node_map = node_map.clone();
        repository.expect_node().returning(move |id| {
            node_map
                .get(id)
                .cloned()
                .ok_or_else(|| format!("unknown node {id:?}").into())
        });
    }
    {
        let node_map = node_map.clone();
        repository.expect_children().returning(move |id| {
            Ok(child_map
                .get(id)
                .map(|ids| ids.iter().map(|child| node_map[child].clone()).collect())
                .unwrap_or_default())
        });
    }
    repository
        .expect_property()
        .returning(move |id, property| {
            Ok(property_map
                .get(&(id.to_string(), property.to_string()))
                .cloned())
        });
    repository.expect_content().returning(move |id| {
        content_map
            .get(id)
            .cloned()
            .ok_or_else(|| format!("no content for node {id:?}").into())
    });
    repository
}

fn mock_profiles(rules: &str) -> MockProfileStore {
    let rules = rules.to_string();
    let mut store = MockProfileStore::new();
    store
        .expect_mapping_source()
        .returning(move |_| Ok(rules.clone()));
    store
}

fn passing_validator() -> MockEadValidator {
    let mut validator = MockEadValidator::new();
    validator
        .expect_validate()
        .returning(|_| ValidationOutcome::Passed);
    validator
}

fn request(export_ids: &[&str], exclude_ids: &[&str]) -> ExtractionRequest {
    ExtractionRequest {
        mapping_name: "archive".to_string(),
        exclude_ids: exclude_ids.iter().map(|s| s.to_string()).collect(),
        export_ids: export_ids.iter().map(|s| s.to_string()).collect(),
    }
}

fn read_finding_aid(export_root: &std::path::Path) -> Element {
    let xml = fs::read_to_string(export_root.join("metadata/ead.xml"))
        .expect("finding aid should be written");
    dom::parse(&xml).expect("finding aid should parse")
}

fn dsc_of(ead: &Element) -> &Element {
    ead.child("archdesc")
        .expect("archdesc survives from the template")
        .child("dsc")
        .expect("dsc survives from the template")
}

/// Scenario A: Series → leaf File → scan.pdf, no exclusions.
#[tokio::test]
async fn two_level_tree_yields_nested_elements_one_pointer_and_a_copy() {
    let repository = mock_repository(
        vec![
            folder("series-1", "erms:series", "Series", "/repo/Series"),
            folder("file-1", "erms:file", "File", "/repo/Series/File"),
            document("doc-1", "scan.pdf"),
        ],
        vec![("series-1", vec!["file-1"]), ("file-1", vec!["doc-1"])],
        vec![
            ("series-1", "cmis:name", "Series"),
            ("series-1", "cmis:objectId", "series-1"),
            ("file-1", "cmis:name", "File"),
        ],
        vec![("doc-1", b"%PDF fake scan")],
    );
    let tmp = tempdir().expect("tempdir");
    let export_root = tmp.path().join("export");

    let report = extract(
        &request(&["series-1"], &[]),
        &repository,
        &mock_profiles(RULES),
        &passing_validator(),
        EAD_TEMPLATE,
        &export_root,
    )
    .await
    .expect("extraction should succeed");

    assert_eq!(report.status, ExtractionStatus::Done);
    assert!(report.is_complete());
    assert_eq!(report.exported.len(), 1);
    assert_eq!(report.exported[0].node_id, "doc-1");
    assert_eq!(report.exported[0].relative_path, "Series/File/scan.pdf");

    let copy = export_root.join("data/Series/File/scan.pdf");
    assert_eq!(
        fs::read(&copy).expect("exported copy should exist"),
        b"%PDF fake scan"
    );

    let ead = read_finding_aid(&export_root);
    let dsc = dsc_of(&ead);
    let series: Vec<&Element> = dsc.children_named("c").collect();
    assert_eq!(series.len(), 1, "one Series element");
    assert_eq!(series[0].attribute("id"), Some("series-1"));
    assert_eq!(
        series[0]
            .child("did")
            .and_then(|did| did.child("unittitle"))
            .map(Element::text),
        Some("Series".to_string())
    );

    let files: Vec<&Element> = series[0].children_named("c").collect();
    assert_eq!(files.len(), 1, "one File element inside Series");
    assert_eq!(
        files[0]
            .child("did")
            .and_then(|did| did.child("unittitle"))
            .map(Element::text),
        Some("File".to_string())
    );

    let pointers: Vec<&Element> = files[0].children_named("dao").collect();
    assert_eq!(pointers.len(), 1, "exactly one pointer for one document");
    assert_eq!(
        pointers[0].attribute("href"),
        Some("data/Series/File/scan.pdf")
    );
    assert_eq!(pointers[0].attribute("title"), Some("scan.pdf"));
}

/// Scenario B: as A, but the File folder is excluded.
#[tokio::test]
async fn excluded_subtree_appears_nowhere_in_document_or_export() {
    let repository = mock_repository(
        vec![
            folder("series-1", "erms:series", "Series", "/repo/Series"),
            folder("file-1", "erms:file", "File", "/repo/Series/File"),
            document("doc-1", "scan.pdf"),
        ],
        vec![("series-1", vec!["file-1"]), ("file-1", vec!["doc-1"])],
        vec![
            ("series-1", "cmis:name", "Series"),
            ("series-1", "cmis:objectId", "series-1"),
        ],
        vec![("doc-1", b"%PDF fake scan")],
    );
    let tmp = tempdir().expect("tempdir");
    let export_root = tmp.path().join("export");

    let report = extract(
        &request(&["series-1"], &["file-1"]),
        &repository,
        &mock_profiles(RULES),
        &passing_validator(),
        EAD_TEMPLATE,
        &export_root,
    )
    .await
    .expect("extraction should succeed");

    assert!(report.exported.is_empty(), "nothing may be copied");
    let ead = read_finding_aid(&export_root);
    let series: Vec<&Element> = dsc_of(&ead).children_named("c").collect();
    assert_eq!(series.len(), 1, "the Series element itself survives");
    assert!(
        series[0].children_named("c").next().is_none(),
        "no File child below the Series element"
    );
    assert!(
        !export_root.join("data").exists(),
        "no file content may be written"
    );
}

/// Scenario C: a leaf folder with zero document descendants keeps no
/// pointer at all; the template placeholder is stripped.
#[tokio::test]
async fn leaf_without_documents_loses_its_placeholder_pointer() {
    let repository = mock_repository(
        vec![
            folder("file-1", "erms:file", "File", "/repo/File"),
            folder("sub-1", "erms:plainfolder", "sub", "/repo/File/sub"),
        ],
        vec![("file-1", vec!["sub-1"])],
        vec![("file-1", "cmis:name", "File")],
        vec![],
    );
    let tmp = tempdir().expect("tempdir");
    let export_root = tmp.path().join("export");

    let report = extract(
        &request(&["file-1"], &[]),
        &repository,
        &mock_profiles(RULES),
        &passing_validator(),
        EAD_TEMPLATE,
        &export_root,
    )
    .await
    .expect("extraction should succeed");

    assert!(report.exported.is_empty());
    let ead = read_finding_aid(&export_root);
    let files: Vec<&Element> = dsc_of(&ead).children_named("c").collect();
    assert_eq!(files.len(), 1);
    assert!(
        files[0].children_named("dao").next().is_none(),
        "placeholder pointer must be stripped from an empty leaf"
    );
}

/// Scenario D: a hook whose locator matches nothing aborts the run and
/// writes no output artifact.
#[tokio::test]
async fn unresolvable_hook_aborts_without_writing_output() {
    let broken_rules = RULES.replace("did/unittitle", "did/abstract");
    let repository = mock_repository(
        vec![folder("series-1", "erms:series", "Series", "/repo/Series")],
        vec![],
        vec![
            ("series-1", "cmis:name", "Series"),
            ("series-1", "cmis:objectId", "series-1"),
        ],
        vec![],
    );
    let tmp = tempdir().expect("tempdir");
    let export_root = tmp.path().join("export");

    let err = extract(
        &request(&["series-1"], &[]),
        &repository,
        &mock_profiles(&broken_rules),
        &passing_validator(),
        EAD_TEMPLATE,
        &export_root,
    )
    .await
    .expect_err("an unresolvable hook must abort the run");

    match &err {
        ExtractionError::Mapping(MapError::UnresolvedTarget {
            node_id, locator, ..
        }) => {
            assert_eq!(node_id, "series-1");
            assert_eq!(locator, "did/abstract");
        }
        other => panic!("expected UnresolvedTarget, got {other:?}"),
    }
    assert!(
        !export_root.exists(),
        "no output artifact may be written on a mapping error"
    );
}

/// Siblings appear in the document in visitation order, pointers included.
#[tokio::test]
async fn sibling_order_matches_visitation_order() {
    let repository = mock_repository(
        vec![
            folder("series-1", "erms:series", "Series", "/repo/Series"),
            folder("file-a", "erms:file", "Alpha", "/repo/Series/Alpha"),
            folder("file-b", "erms:file", "Beta", "/repo/Series/Beta"),
            document("doc-1", "first.pdf"),
            document("doc-2", "second.pdf"),
        ],
        vec![
            ("series-1", vec!["file-a", "file-b"]),
            ("file-a", vec!["doc-1", "doc-2"]),
        ],
        vec![
            ("series-1", "cmis:name", "Series"),
            ("series-1", "cmis:objectId", "series-1"),
            ("file-a", "cmis:name", "Alpha"),
            ("file-b", "cmis:name", "Beta"),
        ],
        vec![("doc-1", b"one"), ("doc-2", b"two")],
    );
    let tmp = tempdir().expect("tempdir");
    let export_root = tmp.path().join("export");

    extract(
        &request(&["series-1"], &[]),
        &repository,
        &mock_profiles(RULES),
        &passing_validator(),
        EAD_TEMPLATE,
        &export_root,
    )
    .await
    .expect("extraction should succeed");

    let ead = read_finding_aid(&export_root);
    let series: Vec<&Element> = dsc_of(&ead).children_named("c").collect();
    let titles: Vec<String> = series[0]
        .children_named("c")
        .map(|c| {
            c.child("did")
                .and_then(|did| did.child("unittitle"))
                .map(Element::text)
                .unwrap_or_default()
        })
        .collect();
    assert_eq!(titles, vec!["Alpha".to_string(), "Beta".to_string()]);

    let alpha = series[0].children_named("c").next().expect("Alpha element");
    let hrefs: Vec<&str> = alpha
        .children_named("dao")
        .filter_map(|dao| dao.attribute("href"))
        .collect();
    assert_eq!(
        hrefs,
        vec![
            "data/Series/Alpha/first.pdf",
            "data/Series/Alpha/second.pdf"
        ]
    );
}

/// Requested roots map under the top-level insertion point in request order.
#[tokio::test]
async fn multiple_roots_keep_request_order() {
    let repository = mock_repository(
        vec![
            folder("series-1", "erms:series", "One", "/repo/One"),
            folder("series-2", "erms:series", "Two", "/repo/Two"),
        ],
        vec![],
        vec![
            ("series-1", "cmis:name", "One"),
            ("series-1", "cmis:objectId", "series-1"),
            ("series-2", "cmis:name", "Two"),
            ("series-2", "cmis:objectId", "series-2"),
        ],
        vec![],
    );
    let tmp = tempdir().expect("tempdir");
    let export_root = tmp.path().join("export");

    extract(
        &request(&["series-2", "series-1"], &[]),
        &repository,
        &mock_profiles(RULES),
        &passing_validator(),
        EAD_TEMPLATE,
        &export_root,
    )
    .await
    .expect("extraction should succeed");

    let ead = read_finding_aid(&export_root);
    let ids: Vec<&str> = dsc_of(&ead)
        .children_named("c")
        .filter_map(|c| c.attribute("id"))
        .collect();
    assert_eq!(ids, vec!["series-2", "series-1"]);
}

/// Children of types outside the semantic structure are skipped silently.
#[tokio::test]
async fn unclassified_types_are_skipped_silently() {
    let repository = mock_repository(
        vec![
            folder("series-1", "erms:series", "Series", "/repo/Series"),
            folder("stray-1", "erms:stray", "Stray", "/repo/Series/Stray"),
        ],
        vec![("series-1", vec!["stray-1"])],
        vec![
            ("series-1", "cmis:name", "Series"),
            ("series-1", "cmis:objectId", "series-1"),
        ],
        vec![],
    );
    let tmp = tempdir().expect("tempdir");
    let export_root = tmp.path().join("export");

    let report = extract(
        &request(&["series-1"], &[]),
        &repository,
        &mock_profiles(RULES),
        &passing_validator(),
        EAD_TEMPLATE,
        &export_root,
    )
    .await
    .expect("an unclassified child is not an error");

    assert_eq!(report.status, ExtractionStatus::Done);
    let ead = read_finding_aid(&export_root);
    let series: Vec<&Element> = dsc_of(&ead).children_named("c").collect();
    assert!(
        series[0].children_named("c").next().is_none(),
        "unclassified children must not be mapped"
    );
}

/// An excluded requested root is skipped, not an error.
#[tokio::test]
async fn excluded_root_is_skipped() {
    let repository = mock_repository(vec![], vec![], vec![], vec![]);
    let tmp = tempdir().expect("tempdir");
    let export_root = tmp.path().join("export");

    let report = extract(
        &request(&["series-1"], &["series-1"]),
        &repository,
        &mock_profiles(RULES),
        &passing_validator(),
        EAD_TEMPLATE,
        &export_root,
    )
    .await
    .expect("an excluded root is skipped, not an error");

    assert_eq!(report.status, ExtractionStatus::Done);
    let ead = read_finding_aid(&export_root);
    assert!(dsc_of(&ead).children_named("c").next().is_none());
}

/// A validation failure carries the validator's message and writes nothing.
#[tokio::test]
async fn validation_failure_returns_message_and_writes_no_finding_aid() {
    let repository = mock_repository(
        vec![folder("series-1", "erms:series", "Series", "/repo/Series")],
        vec![],
        vec![
            ("series-1", "cmis:name", "Series"),
            ("series-1", "cmis:objectId", "series-1"),
        ],
        vec![],
    );
    let mut validator = MockEadValidator::new();
    validator.expect_validate().returning(|_| {
        ValidationOutcome::Failed {
            message: "element c not allowed here".to_string(),
        }
    });
    let tmp = tempdir().expect("tempdir");
    let export_root = tmp.path().join("export");

    let err = extract(
        &request(&["series-1"], &[]),
        &repository,
        &mock_profiles(RULES),
        &validator,
        EAD_TEMPLATE,
        &export_root,
    )
    .await
    .expect_err("a failed validation must abort the run");

    match &err {
        ExtractionError::Validation { message } => {
            assert_eq!(message, "element c not allowed here");
        }
        other => panic!("expected Validation, got {other:?}"),
    }
    assert!(
        !export_root.join("metadata").join("ead.xml").exists(),
        "no finding aid may be written after a failed validation"
    );
}

/// A single failed copy does not abort the run: it is aggregated and the
/// run finishes with a partial-success status.
#[tokio::test]
async fn failed_copy_is_aggregated_not_fatal() {
    // no content registered for doc-1, so its copy fails
    let repository = mock_repository(
        vec![
            folder("file-1", "erms:file", "File", "/repo/File"),
            document("doc-1", "scan.pdf"),
        ],
        vec![("file-1", vec!["doc-1"])],
        vec![("file-1", "cmis:name", "File")],
        vec![],
    );

    let tmp = tempdir().expect("tempdir");
    let export_root = tmp.path().join("export");

    let report = extract(
        &request(&["file-1"], &[]),
        &repository,
        &mock_profiles(RULES),
        &passing_validator(),
        EAD_TEMPLATE,
        &export_root,
    )
    .await
    .expect("a failed copy must not abort the run");

    assert_eq!(report.status, ExtractionStatus::DoneWithFailures);
    assert!(!report.is_complete());
    assert!(report.exported.is_empty());
    assert_eq!(report.failed_copies.len(), 1);
    assert_eq!(report.failed_copies[0].node_id, "doc-1");
    assert_eq!(report.failed_copies[0].relative_path, "File/scan.pdf");

    // the finding aid is still produced, pointer included
    let ead = read_finding_aid(&export_root);
    let files: Vec<&Element> = dsc_of(&ead).children_named("c").collect();
    assert_eq!(files[0].children_named("dao").count(), 1);
    assert!(!export_root.join("data/File/scan.pdf").exists());
}
