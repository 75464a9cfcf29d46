use http::StatusCode;
use serde_json::json;
use switchyard::{ActionController, Response};

use crate::store::PostStore;

pub fn post_controller() -> ActionController {
    ActionController::new()
        .action("list", |_req, ctx| {
            let posts = ctx.app_state.require::<PostStore>()?.all();
            ctx.view.assign("posts", posts)?;
            Ok(Some(ctx.render_action(None)?))
        })
        .action("show", |req, ctx| {
            let id = req.param_str("id").and_then(|id| id.parse::<u32>().ok());
            let post = id.and_then(|id| ctx.app_state.get::<PostStore>()?.find(id));
            match post {
                Some(post) => {
                    ctx.view.assign("post", post)?;
                    Ok(Some(ctx.render_action(None)?))
                }
                None => Ok(Some(
                    Response::text("no such post").with_status(StatusCode::NOT_FOUND),
                )),
            }
        })
        .action("create", |req, ctx| {
            let title = req.param_str("title").filter(|_| req.is_post("title"));
            let Some(title) = title else {
                return Ok(Some(
                    Response::text("title must be posted").with_status(StatusCode::BAD_REQUEST),
                ));
            };
            let body = req.param_str("body").unwrap_or_default();
            let post = ctx.app_state.require::<PostStore>()?.add(title, body);
            log::info!("created post {}", post.id);
            let base = req.base_path().trim_end_matches('/');
            Ok(Some(Response::redirect(format!("{base}/blog/post/show/id/{}", post.id))))
        })
        .action("export", |_req, ctx| {
            let posts = ctx.app_state.require::<PostStore>()?.all();
            Ok(Some(
                Response::new(StatusCode::OK, json!({ "posts": posts }).to_string())
                    .with_header("Content-Type", "application/json"),
            ))
        })
}
