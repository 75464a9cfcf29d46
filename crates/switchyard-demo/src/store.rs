use std::cell::RefCell;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: u32,
    pub title: String,
    pub body: String,
}

/// In-memory posts, shared through app state.
#[derive(Debug, Default)]
pub struct PostStore {
    posts: RefCell<Vec<Post>>,
}

impl PostStore {
    pub fn seeded() -> Self {
        let store = Self::default();
        store.add("Hello, switchyard", "The first post.");
        store.add("Routing", "Segments map to module, controller and action.");
        store
    }

    pub fn add(&self, title: impl Into<String>, body: impl Into<String>) -> Post {
        let mut posts = self.posts.borrow_mut();
        let id = posts.last().map_or(1, |p| p.id + 1);
        let post = Post {
            id,
            title: title.into(),
            body: body.into(),
        };
        posts.push(post.clone());
        post
    }

    pub fn find(&self, id: u32) -> Option<Post> {
        self.posts.borrow().iter().find(|p| p.id == id).cloned()
    }

    pub fn all(&self) -> Vec<Post> {
        self.posts.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.posts.borrow().len()
    }
}
