pub mod activity_markup;
