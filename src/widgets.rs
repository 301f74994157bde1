//! Demo widget service and raw-bytes echo endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderName, HeaderValue};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use endpoint_binder::{
    handler_fn, Args, AxumRouter, BindError, Binder, Binding, Capabilities, Field, Handler,
    Request, ResourceDef, Response, RootHandler,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: u64,
    pub name: String,
    pub color: String,
}

/// Create/replace payload. Accepted as JSON or as a urlencoded or multipart form.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct NewWidget {
    pub name: String,
    #[serde(default)]
    pub color: String,
}

impl Args for NewWidget {
    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::string("name", |w: &mut Self, v: String| w.name = v),
            Field::string("color", |w: &mut Self, v: String| w.color = v),
        ]
    }
}

#[derive(Debug, Default)]
pub struct WidgetId {
    pub id: u64,
}

impl Args for WidgetId {
    fn fields() -> Vec<Field<Self>> {
        vec![Field::uint("id", |w: &mut Self, v: u64| w.id = v)]
    }
}

#[derive(Debug, Default)]
pub struct ListArgs {
    pub color: String,
    pub limit: u64,
}

impl Args for ListArgs {
    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::string("color", |a: &mut Self, v: String| a.color = v),
            Field::uint("limit", |a: &mut Self, v: u64| a.limit = v),
        ]
    }
}

/// In-memory widget store.
#[derive(Debug, Default)]
pub struct WidgetStore {
    widgets: DashMap<u64, Widget>,
    next_id: AtomicU64,
}

impl WidgetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, new: NewWidget) -> Widget {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let widget = Widget {
            id,
            name: new.name,
            color: new.color,
        };
        self.widgets.insert(id, widget.clone());
        widget
    }

    pub fn get(&self, id: u64) -> Option<Widget> {
        self.widgets.get(&id).map(|r| r.value().clone())
    }

    pub fn replace(&self, id: u64, new: NewWidget) -> Option<Widget> {
        let mut entry = self.widgets.get_mut(&id)?;
        entry.name = new.name;
        entry.color = new.color;
        Some(entry.clone())
    }

    pub fn remove(&self, id: u64) -> bool {
        self.widgets.remove(&id).is_some()
    }

    /// Widgets ordered by id, optionally filtered by color. A zero limit means all.
    pub fn list(&self, color: &str, limit: u64) -> Vec<Widget> {
        let mut widgets: Vec<Widget> = self
            .widgets
            .iter()
            .map(|r| r.value().clone())
            .filter(|w| color.is_empty() || w.color == color)
            .collect();
        widgets.sort_by_key(|w| w.id);
        if limit > 0 {
            widgets.truncate(limit as usize);
        }
        widgets
    }
}

/// Handlers for `/widgets/{id}`, one capability set per verb shape.
#[derive(Clone)]
pub struct WidgetApi {
    store: Arc<WidgetStore>,
}

impl Handler<WidgetId, (), Widget> for WidgetApi {
    fn capabilities(&self) -> Capabilities<WidgetId, (), Widget> {
        let store = Arc::clone(&self.store);
        Capabilities::new().get(handler_fn(
            move |req: Request<WidgetId>, mut res: Response<Widget>| {
                let store = Arc::clone(&store);
                async move {
                    match store.get(req.args.id) {
                        Some(widget) => res.reply(widget),
                        None => res.set_status(404, format!("widget {} not found", req.args.id)),
                    }
                    res
                }
            },
        ))
    }
}

impl Handler<WidgetId, NewWidget, Widget> for WidgetApi {
    fn capabilities(&self) -> Capabilities<WidgetId, NewWidget, Widget> {
        let store = Arc::clone(&self.store);
        Capabilities::new().put(handler_fn(
            move |req: Request<WidgetId, NewWidget>, mut res: Response<Widget>| {
                let store = Arc::clone(&store);
                async move {
                    let Some(new) = req.body else {
                        res.set_status(400, "missing widget body");
                        return res;
                    };
                    match store.replace(req.args.id, new) {
                        Some(widget) => res.reply(widget),
                        None => res.set_status(404, format!("widget {} not found", req.args.id)),
                    }
                    res
                }
            },
        ))
    }
}

impl Handler<WidgetId, (), ()> for WidgetApi {
    fn capabilities(&self) -> Capabilities<WidgetId, (), ()> {
        let store = Arc::clone(&self.store);
        Capabilities::new().delete(handler_fn(
            move |req: Request<WidgetId>, mut res: Response<()>| {
                let store = Arc::clone(&store);
                async move {
                    if store.remove(req.args.id) {
                        res.set_status(204, "No Content");
                    } else {
                        res.set_status(404, format!("widget {} not found", req.args.id));
                    }
                    res
                }
            },
        ))
    }
}

fn collection(store: Arc<WidgetStore>) -> (Capabilities<ListArgs, (), Vec<Widget>>, Capabilities<(), NewWidget, Widget>) {
    let list_store = Arc::clone(&store);
    let list = Capabilities::new().get(handler_fn(
        move |req: Request<ListArgs>, mut res: Response<Vec<Widget>>| {
            let store = Arc::clone(&list_store);
            async move {
                res.reply(store.list(&req.args.color, req.args.limit));
                res
            }
        },
    ));

    let create = Capabilities::new().post(handler_fn(
        move |req: Request<(), NewWidget>, mut res: Response<Widget>| {
            let store = Arc::clone(&store);
            async move {
                match req.body {
                    Some(new) if !new.name.is_empty() => {
                        let widget = store.create(new);
                        tracing::info!(id = widget.id, "Widget created");
                        if let Ok(location) = HeaderValue::from_str(&format!("/widgets/{}", widget.id)) {
                            res.add_header(HeaderName::from_static("location"), location);
                        }
                        res.set_body(widget);
                        res.set_status(201, "Created");
                    }
                    _ => res.set_status(422, "widget name is required"),
                }
                res
            }
        },
    ));

    (list, create)
}

fn echo() -> Capabilities<(), Bytes, ()> {
    Capabilities::new().post(handler_fn(|req: Request<(), Bytes>, mut res: Response<()>| async move {
        res.set_bytes(req.body.unwrap_or_default());
        res.set_status(200, "ok");
        res
    }))
}

/// Bind every demo endpoint.
pub fn bind_all<Bn: Binder>(
    root: &RootHandler<Bn>,
    router: &mut AxumRouter,
    store: Arc<WidgetStore>,
) -> Result<(), BindError> {
    let api = WidgetApi {
        store: Arc::clone(&store),
    };
    let (list, create) = collection(store);
    let echo = echo();

    root.bind_all(
        router,
        [
            Binding::new(
                ResourceDef::get("/widgets").args::<ListArgs>().reply::<Vec<Widget>>(),
                &list,
            ),
            Binding::new(
                ResourceDef::post("/widgets")
                    .form_body::<NewWidget>()
                    .reply::<Widget>()
                    .accepts([
                        "application/json",
                        "application/x-www-form-urlencoded",
                        "multipart/form-data",
                    ])
                    .produces(["application/json"]),
                &create,
            ),
            Binding::new(
                ResourceDef::get("/widgets/{id}").args::<WidgetId>().reply::<Widget>(),
                &api,
            ),
            Binding::new(
                ResourceDef::put("/widgets/{id}")
                    .args::<WidgetId>()
                    .body::<NewWidget>()
                    .reply::<Widget>()
                    .produces(["application/json"]),
                &api,
            ),
            Binding::new(ResourceDef::delete("/widgets/{id}").args::<WidgetId>(), &api),
            Binding::new(
                ResourceDef::post("/echo")
                    .raw_body()
                    .produces(["application/octet-stream"]),
                &echo,
            ),
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn app() -> axum::Router {
        let mut router = AxumRouter::new();
        bind_all(&RootHandler::new(), &mut router, Arc::new(WidgetStore::new())).unwrap();
        router.into_router()
    }

    async fn send(app: &axum::Router, request: axum::http::Request<Body>) -> (StatusCode, String) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[test]
    fn test_store_list_filters_and_limits() {
        let store = WidgetStore::new();
        for (name, color) in [("a", "red"), ("b", "blue"), ("c", "red")] {
            store.create(NewWidget { name: name.into(), color: color.into() });
        }
        let red: Vec<_> = store.list("red", 0).into_iter().map(|w| w.name).collect();
        assert_eq!(red, vec!["a", "c"]);
        assert_eq!(store.list("", 2).len(), 2);
    }

    #[tokio::test]
    async fn test_widget_lifecycle() {
        let app = app();

        let (status, body) = send(
            &app,
            axum::http::Request::post("/widgets")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"name":"sprocket","color":"red"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, r#"{"id":1,"name":"sprocket","color":"red"}"#);

        let (status, body) = send(
            &app,
            axum::http::Request::put("/widgets/1")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"name":"cog"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"id":1,"name":"cog","color":""}"#);

        let (status, _) = send(
            &app,
            axum::http::Request::delete("/widgets/1").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(
            &app,
            axum::http::Request::get("/widgets/1").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "widget 1 not found\n");
    }

    #[tokio::test]
    async fn test_create_from_form() {
        let app = app();
        let (status, body) = send(
            &app,
            axum::http::Request::post("/widgets")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("name=gear&color=blue"))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body.contains(r#""name":"gear""#));
    }

    #[tokio::test]
    async fn test_create_from_multipart_form() {
        let app = app();
        let form = concat!(
            "--b1\r\n",
            "Content-Disposition: form-data; name=\"name\"\r\n\r\n",
            "cog\r\n",
            "--b1\r\n",
            "Content-Disposition: form-data; name=\"color\"\r\n\r\n",
            "green\r\n",
            "--b1--\r\n",
        );
        let (status, body) = send(
            &app,
            axum::http::Request::post("/widgets")
                .header("content-type", "multipart/form-data; boundary=b1")
                .body(Body::from(form))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body.contains(r#""name":"cog""#));
        assert!(body.contains(r#""color":"green""#));
    }

    #[tokio::test]
    async fn test_echo_returns_raw_bytes() {
        let app = app();
        let response = app
            .oneshot(
                axum::http::Request::post("/echo")
                    .header("content-type", "image/png")
                    .body(Body::from(vec![0u8, 159, 146, 150]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/octet-stream");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.as_ref(), &[0u8, 159, 146, 150]);
    }

    #[tokio::test]
    async fn test_bad_id_is_rejected() {
        let app = app();
        let (status, body) = send(
            &app,
            axum::http::Request::get("/widgets/abc").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Bad Request: failed parse expected URL parameters\n");
    }
}
