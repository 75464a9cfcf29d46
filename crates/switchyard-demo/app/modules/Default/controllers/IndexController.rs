use switchyard::{ActionResult, Controller, DispatchContext, Request, Response};

use crate::store::PostStore;

/// Landing pages.
#[derive(Default)]
pub struct IndexController;

impl Controller for IndexController {
    fn execute(&mut self, action: &str, request: &mut Request, ctx: &mut DispatchContext) -> ActionResult {
        match action {
            "index" => {
                let store = ctx.app_state.require::<PostStore>()?;
                ctx.view.assign("host", request.host())?;
                ctx.view.assign("post_count", store.len())?;
                Ok(Some(ctx.render_action(None)?))
            }
            "about" => Ok(Some(Response::text("switchyard demo"))),
            _ => Ok(None),
        }
    }

    fn has_action(&self, action: &str) -> bool {
        matches!(action, "index" | "about")
    }
}
