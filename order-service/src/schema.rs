diesel::table! {
    books (id) {
        id -> Int8,
        title -> Varchar,
        price -> Numeric,
        stock_quantity -> Int4,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    orders (id) {
        id -> Int8,
        order_number -> Varchar,
        user_id -> Int8,
        subtotal -> Numeric,
        shipping -> Numeric,
        tax -> Numeric,
        total -> Numeric,
        status -> Varchar,
        shipping_address -> Jsonb,
        payment_method -> Varchar,
        tracking_number -> Nullable<Varchar>,
        notes -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    order_items (id) {
        id -> Int8,
        order_id -> Int8,
        book_id -> Int8,
        quantity -> Int4,
        price -> Numeric,
        total -> Numeric,
    }
}

diesel::table! {
    order_status_history (id) {
        id -> Int8,
        order_id -> Int8,
        status -> Varchar,
        changed_by -> Int8,
        notes -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(order_items -> books (book_id));
diesel::joinable!(order_items -> orders (order_id));
diesel::joinable!(order_status_history -> orders (order_id));

diesel::allow_tables_to_appear_in_same_query!(
    books,
    orders,
    order_items,
    order_status_history,
);
