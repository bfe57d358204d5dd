mod attachments;
mod categories;
mod tags;
mod tasks;
