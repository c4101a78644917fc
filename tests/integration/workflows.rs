//! Workflow listing, versions, menu and missing-tool report over HTTP.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use flowhub::client::FlowhubClient;
use flowhub::storage::WorkflowStep;
use flowhub::toolshed::InstalledToolbox;
use flowhub::workflows::{
    CreateWorkflowRequest, UpdateWorkflowRequest, WorkflowIndex, WorkflowIndexQuery,
    WorkflowSummary,
};
use pretty_assertions::assert_eq;

use super::common::{encode_id, status_of, TestServer};

const FASTQC: &str = "toolshed.g2.bx.psu.edu/repos/devteam/fastqc/fastqc/0.73";
const BWA_MEM: &str = "toolshed.g2.bx.psu.edu/repos/iuc/bwa/bwa_mem/0.7.17";
const BWA_ALN: &str = "toolshed.g2.bx.psu.edu/repos/iuc/bwa/bwa_aln/0.7.17";
const DESEQ: &str = "testtoolshed.example.org/repos/bgruening/deseq2/deseq2/1.0";

async fn create(client: &FlowhubClient, name: &str, steps: Vec<WorkflowStep>) -> WorkflowSummary {
    client
        .create_workflow(&CreateWorkflowRequest {
            name: name.to_string(),
            steps,
            ..CreateWorkflowRequest::default()
        })
        .await
        .unwrap()
}

fn summaries(index: WorkflowIndex) -> Vec<WorkflowSummary> {
    match index {
        WorkflowIndex::Summaries(summaries) => summaries,
        WorkflowIndex::MissingTools(groups) => panic!("expected summaries, got {groups:?}"),
    }
}

fn tool(id: &str) -> WorkflowStep {
    WorkflowStep::tool(id, "1.0")
}

#[tokio::test]
async fn test_index_lists_own_workflows_with_total() {
    let server = TestServer::start().await;
    let (_, owner) = server.new_user().await;
    create(&owner, "Alignment", vec![tool("cat1")]).await;
    create(&owner, "QC", vec![tool("cat1"), tool("sort1")]).await;

    let (index, total) = owner.workflows(&WorkflowIndexQuery::default()).await.unwrap();
    let listed = summaries(index);
    assert_eq!(total, Some(2));
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].name, "QC");
    assert_eq!(listed[0].number_of_steps, Some(2));
    assert_eq!(listed[0].url, format!("/workflows/{}", listed[0].id));

    let (anonymous, total) = server
        .anonymous()
        .workflows(&WorkflowIndexQuery::default())
        .await
        .unwrap();
    assert!(summaries(anonymous).is_empty());
    assert_eq!(total, Some(0));

    server.stop().await;
}

#[tokio::test]
async fn test_published_workflow_is_public() {
    let server = TestServer::start().await;
    let (_, owner) = server.new_user().await;
    owner
        .create_workflow(&CreateWorkflowRequest {
            name: "Public".to_string(),
            published: true,
            ..CreateWorkflowRequest::default()
        })
        .await
        .unwrap();

    let (index, _) = server
        .anonymous()
        .workflows(&WorkflowIndexQuery::default())
        .await
        .unwrap();
    let listed = summaries(index);
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].show_in_tool_panel);

    server.stop().await;
}

#[tokio::test]
async fn test_search_and_paging() {
    let server = TestServer::start().await;
    let (_, owner) = server.new_user().await;
    for name in ["RNA-seq", "ChIP-seq", "Variant calling"] {
        create(&owner, name, Vec::new()).await;
    }

    let query = WorkflowIndexQuery {
        search: Some("seq".to_string()),
        ..WorkflowIndexQuery::default()
    };
    let (index, total) = owner.workflows(&query).await.unwrap();
    assert_eq!(summaries(index).len(), 2);
    assert_eq!(total, Some(2));

    let query = WorkflowIndexQuery {
        limit: Some(1),
        offset: Some(1),
        ..WorkflowIndexQuery::default()
    };
    let (index, total) = owner.workflows(&query).await.unwrap();
    assert_eq!(summaries(index).len(), 1);
    assert_eq!(total, Some(3));

    server.stop().await;
}

#[tokio::test]
async fn test_versions_newest_first() {
    let server = TestServer::start().await;
    let (_, owner) = server.new_user().await;
    let workflow = create(&owner, "Evolving", vec![tool("cat1")]).await;

    owner
        .update_workflow(
            &workflow.id,
            &UpdateWorkflowRequest {
                steps: Some(vec![tool("cat1"), tool("sort1"), tool("head1")]),
                ..UpdateWorkflowRequest::default()
            },
        )
        .await
        .unwrap();

    let versions = owner.workflow_versions(&workflow.id, false).await.unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].version, 0);
    assert_eq!(versions[0].steps, 3);
    assert_eq!(versions[1].version, 1);
    assert_eq!(versions[1].steps, 1);

    let counts = owner.workflow_counts(&workflow.id, false).await.unwrap();
    assert!(counts.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_delete_and_undelete() {
    let server = TestServer::start().await;
    let (_, owner) = server.new_user().await;
    let (_, stranger) = server.new_user().await;
    let workflow = create(&owner, "Disposable", Vec::new()).await;

    assert_eq!(status_of(stranger.delete_workflow(&workflow.id).await), 403);
    assert_eq!(status_of(owner.delete_workflow("nonsense").await), 400);
    assert_eq!(status_of(owner.delete_workflow(&encode_id(424_242)).await), 404);

    owner.delete_workflow(&workflow.id).await.unwrap();
    let (index, _) = owner.workflows(&WorkflowIndexQuery::default()).await.unwrap();
    assert!(summaries(index).is_empty());

    let deleted = WorkflowIndexQuery {
        show_deleted: true,
        ..WorkflowIndexQuery::default()
    };
    let (index, _) = owner.workflows(&deleted).await.unwrap();
    let listed = summaries(index);
    assert_eq!(listed.len(), 1);
    assert!(listed[0].deleted);

    owner.undelete_workflow(&workflow.id).await.unwrap();
    let (index, _) = owner.workflows(&WorkflowIndexQuery::default()).await.unwrap();
    assert_eq!(summaries(index).len(), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_menu_marks_tool_panel_entries() {
    let server = TestServer::start().await;
    let (_, owner) = server.new_user().await;
    let pinned = create(&owner, "Pinned", Vec::new()).await;
    create(&owner, "Other", Vec::new()).await;

    let ids = owner.set_workflow_menu(&[&pinned.id]).await.unwrap();
    assert_eq!(ids, vec![pinned.id.clone()]);

    let menu = owner
        .workflow_menu(&WorkflowIndexQuery::default())
        .await
        .unwrap();
    assert_eq!(menu.ids_in_menu, vec![pinned.id.clone()]);

    let listed = summaries(menu.workflows);
    assert_eq!(listed.len(), 2);
    for summary in listed {
        assert_eq!(summary.show_in_tool_panel, summary.id == pinned.id);
    }

    assert_eq!(
        status_of(
            server
                .anonymous()
                .workflow_menu(&WorkflowIndexQuery::default())
                .await
        ),
        403
    );

    server.stop().await;
}

#[tokio::test]
async fn test_missing_tools_grouped_by_repository() {
    let server = TestServer::start_with(|_| {}, InstalledToolbox::from_ids([FASTQC])).await;
    let (_, owner) = server.new_user().await;
    create(&owner, "Installed only", vec![tool(FASTQC), tool("cat1")]).await;
    create(&owner, "Mapping", vec![tool(BWA_MEM), tool(FASTQC)]).await;
    create(&owner, "Mapping v2", vec![tool(BWA_ALN), tool(BWA_MEM), tool(DESEQ)]).await;

    let query = WorkflowIndexQuery {
        missing_tools: true,
        sort_desc: false,
        ..WorkflowIndexQuery::default()
    };
    let (index, _) = owner.workflows(&query).await.unwrap();
    let WorkflowIndex::MissingTools(groups) = index else {
        panic!("expected missing tool groups");
    };

    assert_eq!(groups.len(), 2);

    let bwa = &groups[0];
    assert_eq!(bwa.shed.as_deref(), Some("https://toolshed.g2.bx.psu.edu"));
    assert_eq!(bwa.owner, "iuc");
    assert_eq!(bwa.repository, "bwa");
    assert_eq!(
        bwa.tools.iter().map(String::as_str).collect::<Vec<_>>(),
        vec![BWA_MEM, BWA_ALN]
    );
    assert_eq!(
        bwa.workflows.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["Mapping", "Mapping v2"]
    );

    let deseq = &groups[1];
    assert_eq!(deseq.shed, None);
    assert_eq!(deseq.repository, "deseq2");

    server.stop().await;
}
