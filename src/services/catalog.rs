//! Catalog service: books, reviews and favorites

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{BookDetails, BookPage, BookQuery, BookStatistics, CreateBook, CreateReview, UpdateBook},
        Book, FavoriteBook, PageParams, Pagination, Review,
    },
    repository::Repository,
};

/// Reviews shown on a book page
const RECENT_REVIEWS: i64 = 10;
/// Recent borrows used to profile a reader's taste
const TASTE_DEPTH: i64 = 5;
/// Days covered by the borrow trend
const TREND_DAYS: i32 = 30;

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn search(&self, query: &BookQuery) -> AppResult<BookPage> {
        let page = PageParams::resolve(query.page, query.limit, 10);
        let (books, total) = self.repository.books.search(query, &page).await?;
        Ok(BookPage {
            books,
            pagination: Pagination::new(total, &page),
        })
    }

    /// Book with category and latest reviews
    pub async fn get_details(&self, id: i32) -> AppResult<BookDetails> {
        let book = self.repository.books.get_by_id(id).await?;
        let category = match book.category_id {
            Some(category_id) => match self.repository.categories.get_by_id(category_id).await {
                Ok(category) => Some(category),
                Err(AppError::NotFound(_)) => None,
                Err(e) => return Err(e),
            },
            None => None,
        };
        let reviews = self.repository.reviews.recent_for_book(id, RECENT_REVIEWS).await?;

        Ok(BookDetails {
            book,
            category,
            reviews,
        })
    }

    pub async fn create(&self, data: &CreateBook) -> AppResult<Book> {
        let (total, available) = data.quantities()?;
        if let Some(category_id) = data.category_id {
            self.ensure_category(category_id).await?;
        }
        let book = self.repository.books.create(data, total, available).await?;
        tracing::info!(book_id = book.id, isbn = %book.isbn, "Book created");
        Ok(book)
    }

    pub async fn update(&self, id: i32, data: &UpdateBook) -> AppResult<Book> {
        if let Some(category_id) = data.category_id {
            self.ensure_category(category_id).await?;
        }
        self.repository.books.update(id, data).await
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.books.delete(id).await
    }

    async fn ensure_category(&self, category_id: i32) -> AppResult<()> {
        match self.repository.categories.get_by_id(category_id).await {
            Ok(_) => Ok(()),
            Err(AppError::NotFound(msg)) => Err(AppError::Validation(msg)),
            Err(e) => Err(e),
        }
    }

    pub async fn popular(&self, limit: Option<i64>) -> AppResult<Vec<Book>> {
        let limit = limit.unwrap_or(10).clamp(1, PageParams::MAX_LIMIT);
        self.repository.books.popular(limit).await
    }

    /// Available books in the categories the reader borrowed from recently
    pub async fn recommended(&self, user_id: i32, limit: Option<i64>) -> AppResult<Vec<Book>> {
        let limit = limit.unwrap_or(10).clamp(1, PageParams::MAX_LIMIT);
        let (recent_books, categories) = self
            .repository
            .books
            .recent_borrow_profile(user_id, TASTE_DEPTH)
            .await?;
        self.repository
            .books
            .recommended(&categories, &recent_books, limit)
            .await
    }

    pub async fn statistics(&self) -> AppResult<BookStatistics> {
        let (total_books, available_books) = self.repository.books.stock_totals().await?;
        let borrows = self.repository.borrows.statistics(None).await?;
        let category_stats = self.repository.categories.book_counts().await?;
        let borrow_trend = self.repository.books.borrow_trend(TREND_DAYS).await?;

        Ok(BookStatistics {
            total_books,
            available_books,
            borrowed_books: borrows.active_borrows,
            overdue_books: borrows.overdue_borrows,
            category_stats,
            borrow_trend,
        })
    }

    /// Review a book once; the book's rating is refreshed with it
    pub async fn add_review(&self, user_id: i32, book_id: i32, data: &CreateReview) -> AppResult<Review> {
        self.repository
            .reviews
            .add(user_id, book_id, data.rating, data.comment.as_deref())
            .await
    }

    pub async fn add_favorite(&self, user_id: i32, book_id: i32) -> AppResult<i32> {
        if !self.repository.books.exists(book_id).await? {
            return Err(AppError::NotFound(format!("Book {} not found", book_id)));
        }
        self.repository.favorites.add(user_id, book_id).await
    }

    pub async fn remove_favorite(&self, user_id: i32, book_id: i32) -> AppResult<()> {
        self.repository.favorites.remove(user_id, book_id).await
    }

    pub async fn favorites(&self, user_id: i32) -> AppResult<Vec<FavoriteBook>> {
        self.repository.favorites.list_for_user(user_id).await
    }
}
