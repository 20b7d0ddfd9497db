// Route handlers. Authentication and policy checks happen in middleware,
// so handlers only see requests that are already authorized.
pub mod health;
pub mod todo_items;
