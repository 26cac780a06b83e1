//! Background worker handling query service requests.

use std::{fmt, sync::Arc};
use tokio::sync::mpsc;

use crate::{
    api::{
        Outcome, QueryApi,
        types::{Comment, NewComment, ResultRecord, SaveRequest, SavedQuery, SavedQuerySummary},
    },
    draft::{DateBounds, QueryLocator, QueryType},
    executor, resolver,
    wizard::{Effect, Ticket},
};

/// Commands sent from the UI to the worker.
pub enum WorkerCmd {
    /// Look up the date interval for the wizard.
    FetchDateBounds {
        ticket: Ticket,
        query_type: QueryType,
    },
    /// Run the query built by the wizard.
    ExecuteQuery {
        ticket: Ticket,
        locator: QueryLocator,
    },
    /// Persist the wizard's query.
    SaveQuery { ticket: Ticket, request: SaveRequest },
    /// Reload the saved-query list.
    ListQueries,
    /// Load one saved query and its comments.
    OpenQuery { id: i64 },
    /// Run a saved query's locator.
    RunSavedQuery { id: i64, locator: QueryLocator },
    /// Comment on a saved query.
    PostComment(NewComment),
    /// Switch to a client built from updated settings.
    ReplaceApi(Arc<dyn QueryApi>),
}

impl fmt::Debug for WorkerCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerCmd::FetchDateBounds { ticket, query_type } => {
                write!(f, "FetchDateBounds({query_type}, {ticket})")
            }
            WorkerCmd::ExecuteQuery { ticket, locator } => {
                write!(f, "ExecuteQuery({locator}, {ticket})")
            }
            WorkerCmd::SaveQuery { ticket, request } => {
                write!(f, "SaveQuery({}, {ticket})", request.name)
            }
            WorkerCmd::ListQueries => write!(f, "ListQueries"),
            WorkerCmd::OpenQuery { id } => write!(f, "OpenQuery({id})"),
            WorkerCmd::RunSavedQuery { id, .. } => write!(f, "RunSavedQuery({id})"),
            WorkerCmd::PostComment(c) => write!(f, "PostComment({})", c.query_id),
            WorkerCmd::ReplaceApi(_) => write!(f, "ReplaceApi"),
        }
    }
}

impl From<Effect> for WorkerCmd {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::FetchDateBounds { ticket, query_type } => {
                WorkerCmd::FetchDateBounds { ticket, query_type }
            }
            Effect::ExecuteQuery { ticket, locator } => WorkerCmd::ExecuteQuery { ticket, locator },
            Effect::SaveQuery { ticket, request } => WorkerCmd::SaveQuery { ticket, request },
        }
    }
}

/// Events emitted by the worker for UI updates.
#[derive(Clone, Debug)]
pub enum WorkerEvent {
    /// Date interval lookup finished.
    DateBoundsSettled {
        ticket: Ticket,
        outcome: Outcome<DateBounds>,
    },
    /// Wizard query finished.
    QuerySettled {
        ticket: Ticket,
        outcome: Outcome<Vec<ResultRecord>>,
    },
    /// Save request finished.
    SaveSettled {
        ticket: Ticket,
        result: Result<(), String>,
    },
    /// Saved-query list loaded.
    QueriesLoaded(Vec<SavedQuerySummary>),
    /// Saved query and its comments loaded.
    QueryOpened {
        query: SavedQuery,
        comments: Vec<Comment>,
    },
    /// Saved query run finished.
    SavedQueryRan {
        id: i64,
        outcome: Outcome<Vec<ResultRecord>>,
    },
    /// Comment accepted by the service.
    CommentPosted(NewComment),
    /// Informational log message.
    Log(String),
    /// User-visible error message.
    Error(String),
}

/// Main worker loop: handle commands sequentially until the UI hangs up.
pub async fn run(
    mut rx: mpsc::Receiver<WorkerCmd>,
    tx: mpsc::Sender<WorkerEvent>,
    mut api: Arc<dyn QueryApi>,
) {
    tracing::info!("worker started");

    while let Some(cmd) = rx.recv().await {
        tracing::debug!("worker command: {cmd:?}");
        let ev = match cmd {
            WorkerCmd::ReplaceApi(new_api) => {
                tracing::info!("api client replaced");
                api = new_api;
                WorkerEvent::Log("settings updated".into())
            }

            WorkerCmd::FetchDateBounds { ticket, query_type } => {
                let outcome = resolver::resolve(api.as_ref(), query_type).await;
                tracing::debug!("date bounds {} for {ticket}", outcome.kind());
                WorkerEvent::DateBoundsSettled { ticket, outcome }
            }

            WorkerCmd::ExecuteQuery { ticket, locator } => {
                let outcome = executor::run(api.as_ref(), &locator).await;
                tracing::debug!("query {} for {ticket}", outcome.kind());
                WorkerEvent::QuerySettled { ticket, outcome }
            }

            WorkerCmd::SaveQuery { ticket, request } => {
                tracing::info!("saving query '{}' for {}", request.name, request.username);
                let result = api.save_query(&request).await.map_err(|e| {
                    tracing::error!("error saving query: {e}");
                    e.to_string()
                });
                WorkerEvent::SaveSettled { ticket, result }
            }

            WorkerCmd::ListQueries => match api.list_queries().await {
                Ok(list) => {
                    tracing::info!("loaded {} saved queries", list.len());
                    WorkerEvent::QueriesLoaded(list)
                }
                Err(e) => {
                    tracing::error!("error fetching queries: {e}");
                    WorkerEvent::Error(format!("loading queries failed: {e}"))
                }
            },

            WorkerCmd::OpenQuery { id } => match open_query(api.as_ref(), id).await {
                Ok((query, comments)) => WorkerEvent::QueryOpened { query, comments },
                Err(e) => {
                    tracing::error!("error opening query {id}: {e}");
                    WorkerEvent::Error(format!("opening query failed: {e}"))
                }
            },

            WorkerCmd::RunSavedQuery { id, locator } => {
                let outcome = executor::run(api.as_ref(), &locator).await;
                WorkerEvent::SavedQueryRan { id, outcome }
            }

            WorkerCmd::PostComment(comment) => match api.post_comment(&comment).await {
                Ok(()) => {
                    tracing::info!("comment posted on query {}", comment.query_id);
                    WorkerEvent::CommentPosted(comment)
                }
                Err(e) => {
                    tracing::error!("error sending comment: {e}");
                    WorkerEvent::Error(format!("Error sending comment: {e}"))
                }
            },
        };

        if tx.send(ev).await.is_err() {
            // The UI is gone; nothing left to report to.
            break;
        }
    }
    tracing::info!("worker stopped");
}

/// Load a saved query together with its comment thread.
async fn open_query(api: &dyn QueryApi, id: i64) -> anyhow::Result<(SavedQuery, Vec<Comment>)> {
    let query = api.get_query(id).await?;
    let comments = api.list_comments(id).await?;
    Ok((query, comments))
}
