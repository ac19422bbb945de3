//! In-memory course catalog.
//!
//! Stores generated courses with ownership, visibility, likes and installs.
//! All state sits behind one async `RwLock`; no lock is held while a model
//! call is in flight.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use gyft_core::CourseOutline;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, ServerError};

/// A course as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCourse {
    /// Unique id.
    pub id: String,
    /// User who owns this copy.
    pub owner_id: String,
    /// Display name of the author.
    pub author_name: String,
    /// The topic the course was generated from.
    pub topic: String,
    /// Whether other users can find, like and install it.
    pub is_public: bool,
    /// Generated content.
    #[serde(flatten)]
    pub outline: CourseOutline,
    /// Users who liked this course.
    #[serde(skip)]
    pub liked_by: BTreeSet<String>,
    /// Number of likes.
    pub like_count: usize,
    /// Number of times other users installed it.
    pub install_count: usize,
    /// Source course, for installed copies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_course_id: Option<String>,
    /// Author of the source course, for installed copies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_author: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Install time, for installed copies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<DateTime<Utc>>,
    /// Insertion order; breaks ties between equal timestamps.
    #[serde(skip)]
    seq: u64,
}

impl StoredCourse {
    /// Whether `user` may read this course.
    #[must_use]
    pub fn visible_to(&self, user: Option<&str>) -> bool {
        self.is_public || user == Some(self.owner_id.as_str())
    }

    fn matches_search(&self, needle: &str) -> bool {
        [
            &self.outline.title,
            &self.outline.description,
            &self.topic,
            &self.outline.language,
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
    }
}

/// A new course to add to the catalog.
#[derive(Debug, Clone)]
pub struct NewCourse {
    /// Owning user.
    pub owner_id: String,
    /// Display name of the author.
    pub author_name: String,
    /// Topic the course was generated from.
    pub topic: String,
    /// Whether it is listed publicly.
    pub is_public: bool,
    /// Generated content.
    pub outline: CourseOutline,
}

/// Ordering of the public listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Most recent first.
    #[default]
    Newest,
    /// Oldest first.
    Oldest,
    /// Most liked first.
    Likes,
    /// Most installed first, then most liked.
    Popular,
}

impl SortOrder {
    /// Parses a sort name, case-insensitively.
    ///
    /// Unknown names fall back to [`SortOrder::Newest`].
    #[must_use]
    pub fn from_str_lenient(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "oldest" => Self::Oldest,
            "likes" => Self::Likes,
            "popular" => Self::Popular,
            _ => Self::Newest,
        }
    }
}

/// Filters and paging for [`CourseCatalog::list_public`].
#[derive(Debug, Clone, Default)]
pub struct PublicQuery {
    /// Case-insensitive substring of title, description, topic or language.
    pub search: Option<String>,
    /// Exact language.
    pub category: Option<String>,
    /// Result ordering.
    pub sort: SortOrder,
    /// 1-based page number.
    pub page: Option<usize>,
    /// Page size.
    pub limit: Option<usize>,
}

/// One page of public courses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePage {
    /// Courses on this page.
    pub courses: Vec<StoredCourse>,
    /// Matches across all pages.
    pub total_count: usize,
    /// The page returned.
    pub current_page: usize,
    /// Number of pages at this page size.
    pub total_pages: usize,
}

/// Outcome of a like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeStatus {
    /// Whether the user now likes the course.
    pub liked: bool,
    /// Updated like count.
    pub like_count: usize,
}

#[derive(Debug, Default)]
struct Inner {
    courses: Vec<StoredCourse>,
    next_seq: u64,
}

impl Inner {
    fn push(&mut self, mut course: StoredCourse) -> StoredCourse {
        course.seq = self.next_seq;
        self.next_seq += 1;
        self.courses.push(course.clone());
        course
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut StoredCourse> {
        self.courses.iter_mut().find(|c| c.id == id)
    }
}

/// Thread-safe in-memory course store.
#[derive(Debug)]
pub struct CourseCatalog {
    inner: RwLock<Inner>,
    default_page_size: usize,
    max_page_size: usize,
}

impl Default for CourseCatalog {
    fn default() -> Self {
        Self::new(12, 100)
    }
}

impl CourseCatalog {
    /// Creates an empty catalog with the given paging limits.
    #[must_use]
    pub fn new(default_page_size: usize, max_page_size: usize) -> Self {
        let max_page_size = max_page_size.max(1);
        Self {
            inner: RwLock::new(Inner::default()),
            default_page_size: default_page_size.clamp(1, max_page_size),
            max_page_size,
        }
    }

    /// Stores a newly generated course.
    pub async fn insert(&self, course: NewCourse) -> StoredCourse {
        let stored = StoredCourse {
            id: Uuid::new_v4().to_string(),
            owner_id: course.owner_id,
            author_name: course.author_name,
            topic: course.topic,
            is_public: course.is_public,
            outline: course.outline,
            liked_by: BTreeSet::new(),
            like_count: 0,
            install_count: 0,
            original_course_id: None,
            original_author: None,
            created_at: Utc::now(),
            installed_at: None,
            seq: 0,
        };

        let stored = self.inner.write().await.push(stored);
        info!(
            course_id = %stored.id,
            owner = %stored.owner_id,
            public = stored.is_public,
            "Stored course"
        );
        stored
    }

    /// Looks up a course visible to `viewer`.
    ///
    /// # Errors
    ///
    /// `CourseNotFound` when the id is unknown or the course is private to
    /// someone else.
    pub async fn get(&self, id: &str, viewer: Option<&str>) -> Result<StoredCourse> {
        self.inner
            .read()
            .await
            .courses
            .iter()
            .find(|c| c.id == id && c.visible_to(viewer))
            .cloned()
            .ok_or_else(|| ServerError::not_found(id))
    }

    /// Courses owned by `owner`, newest first.
    pub async fn list_owned(&self, owner: &str) -> Vec<StoredCourse> {
        let inner = self.inner.read().await;
        let mut owned: Vec<_> = inner
            .courses
            .iter()
            .filter(|c| c.owner_id == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| newest_first(a, b));
        owned
    }

    /// One page of public courses matching `query`.
    pub async fn list_public(&self, query: &PublicQuery) -> CoursePage {
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let category = query.category.as_deref().filter(|s| !s.is_empty());

        let inner = self.inner.read().await;
        let mut matches: Vec<&StoredCourse> = inner
            .courses
            .iter()
            .filter(|c| c.is_public)
            .filter(|c| needle.as_deref().map_or(true, |n| c.matches_search(n)))
            .filter(|c| category.map_or(true, |cat| c.outline.language == cat))
            .collect();

        match query.sort {
            SortOrder::Newest => matches.sort_by(|a, b| newest_first(a, b)),
            SortOrder::Oldest => matches.sort_by(|a, b| newest_first(b, a)),
            SortOrder::Likes => matches.sort_by(|a, b| {
                b.like_count
                    .cmp(&a.like_count)
                    .then_with(|| newest_first(a, b))
            }),
            SortOrder::Popular => matches.sort_by(|a, b| {
                b.install_count
                    .cmp(&a.install_count)
                    .then_with(|| b.like_count.cmp(&a.like_count))
                    .then_with(|| newest_first(a, b))
            }),
        }

        let limit = query
            .limit
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);
        let page = query.page.unwrap_or(1).max(1);
        let total_count = matches.len();

        let courses = matches
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .cloned()
            .collect();

        debug!(total_count, page, limit, "Listed public courses");
        CoursePage {
            courses,
            total_count,
            current_page: page,
            total_pages: total_count.div_ceil(limit),
        }
    }

    /// Distinct, non-empty languages of public courses, sorted.
    pub async fn categories(&self) -> Vec<String> {
        self.inner
            .read()
            .await
            .courses
            .iter()
            .filter(|c| c.is_public && !c.outline.language.is_empty())
            .map(|c| c.outline.language.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Likes a public course, or removes the like if `user` already gave one.
    ///
    /// # Errors
    ///
    /// `CourseNotFound` when no public course has this id.
    pub async fn toggle_like(&self, id: &str, user: &str) -> Result<LikeStatus> {
        let mut inner = self.inner.write().await;
        let course = inner
            .find_mut(id)
            .filter(|c| c.is_public)
            .ok_or_else(|| ServerError::not_found(id))?;

        let liked = if course.liked_by.remove(user) {
            false
        } else {
            course.liked_by.insert(user.to_string());
            true
        };
        course.like_count = course.liked_by.len();

        debug!(course_id = %id, user, liked, "Toggled like");
        Ok(LikeStatus {
            liked,
            like_count: course.like_count,
        })
    }

    /// Copies a public course into `user`'s private courses.
    ///
    /// # Errors
    ///
    /// `CourseNotFound` when no public course has this id, and
    /// `AlreadyInstalled` when `user` already holds a copy.
    pub async fn install(&self, id: &str, user: &str) -> Result<StoredCourse> {
        let mut inner = self.inner.write().await;

        if inner
            .courses
            .iter()
            .any(|c| c.owner_id == user && c.original_course_id.as_deref() == Some(id))
        {
            return Err(ServerError::already_installed(id));
        }

        let source = inner
            .find_mut(id)
            .filter(|c| c.is_public)
            .ok_or_else(|| ServerError::not_found(id))?;
        source.install_count += 1;

        let now = Utc::now();
        let copy = StoredCourse {
            id: Uuid::new_v4().to_string(),
            owner_id: user.to_string(),
            author_name: source.author_name.clone(),
            topic: source.topic.clone(),
            is_public: false,
            outline: source.outline.clone(),
            liked_by: BTreeSet::new(),
            like_count: 0,
            install_count: 0,
            original_course_id: Some(source.id.clone()),
            original_author: Some(source.author_name.clone()),
            created_at: source.created_at,
            installed_at: Some(now),
            seq: 0,
        };

        let copy = inner.push(copy);
        info!(course_id = %copy.id, source_id = %id, user, "Installed course");
        Ok(copy)
    }

    /// Makes an owned course public or private.
    ///
    /// # Errors
    ///
    /// `CourseNotFound` when `owner` has no course with this id.
    pub async fn set_visibility(
        &self,
        id: &str,
        owner: &str,
        is_public: bool,
    ) -> Result<StoredCourse> {
        let mut inner = self.inner.write().await;
        let course = inner
            .find_mut(id)
            .filter(|c| c.owner_id == owner)
            .ok_or_else(|| ServerError::not_found(id))?;

        course.is_public = is_public;
        info!(course_id = %id, owner, public = is_public, "Changed course visibility");
        Ok(course.clone())
    }

    /// Deletes a course owned by `owner`.
    ///
    /// # Errors
    ///
    /// `CourseForbidden` when a public course belongs to someone else, and
    /// `CourseNotFound` when the course is unknown or private to someone
    /// else.
    pub async fn remove(&self, id: &str, owner: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let index = inner
            .courses
            .iter()
            .position(|c| c.id == id && c.visible_to(Some(owner)))
            .ok_or_else(|| ServerError::not_found(id))?;

        if inner.courses[index].owner_id != owner {
            return Err(ServerError::forbidden(id));
        }

        inner.courses.remove(index);
        info!(course_id = %id, owner, "Deleted course");
        Ok(())
    }

    /// Number of stored courses.
    pub async fn len(&self) -> usize {
        self.inner.read().await.courses.len()
    }

    /// Whether the catalog is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.courses.is_empty()
    }
}

fn newest_first(a: &StoredCourse, b: &StoredCourse) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.seq.cmp(&a.seq))
}
