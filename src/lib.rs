/*!
Last-updated course module log store.

Keeps one record per course module with the timestamp of its latest
creation or update, removes records when modules or whole courses are
deleted, and purges expired records through a scheduled cleanup task.
*/

pub mod core;
