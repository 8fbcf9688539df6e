table! {
    absences (id) {
        id -> Integer,
        user_id -> Integer,
        meeting_id -> Integer,
        teacher_id -> Integer,
        absence_type -> Text,
        is_excused -> Bool,
    }
}

table! {
    class_students (class_id, student_id) {
        class_id -> Integer,
        student_id -> Integer,
    }
}

table! {
    classes (id) {
        id -> Integer,
        name -> Text,
        teacher_id -> Integer,
        class_year -> Text,
    }
}

table! {
    grades (id) {
        id -> Integer,
        user_id -> Integer,
        teacher_id -> Integer,
        subject_id -> Integer,
        grade -> Integer,
        is_written -> Bool,
        period -> Integer,
        is_final -> Bool,
        date -> Date,
    }
}

table! {
    homework (id) {
        id -> Integer,
        teacher_id -> Integer,
        subject_id -> Integer,
        meeting_id -> Integer,
        name -> Text,
        description -> Text,
        to_date -> Date,
        from_date -> Date,
    }
}

table! {
    meetings (id) {
        id -> Integer,
        meeting_name -> Text,
        teacher_id -> Integer,
        subject_id -> Integer,
        date -> Date,
        hour -> Integer,
        is_mandatory -> Bool,
        url -> Text,
        details -> Text,
        is_substitution -> Bool,
        is_grading -> Bool,
        is_written_assessment -> Bool,
        is_test -> Bool,
    }
}

table! {
    parent_children (parent_id, child_id) {
        parent_id -> Integer,
        child_id -> Integer,
    }
}

table! {
    student_homework (homework_id, user_id) {
        homework_id -> Integer,
        user_id -> Integer,
        status -> Text,
    }
}

table! {
    subject_students (subject_id, student_id) {
        subject_id -> Integer,
        student_id -> Integer,
    }
}

table! {
    subjects (id) {
        id -> Integer,
        teacher_id -> Integer,
        name -> Text,
        long_name -> Text,
        class_id -> Nullable<Integer>,
        inherits_class -> Bool,
        realization -> Float,
    }
}

table! {
    testing (id) {
        id -> Integer,
        user_id -> Integer,
        teacher_id -> Integer,
        class_id -> Integer,
        date -> Date,
        result -> Text,
    }
}

table! {
    users (id) {
        id -> Integer,
        email -> Text,
        password -> Text,
        role -> Text,
        name -> Text,
        birth_certificate_number -> Text,
        birthday -> Nullable<Date>,
        city_of_birth -> Text,
        country_of_birth -> Text,
        is_passing -> Bool,
    }
}

allow_tables_to_appear_in_same_query!(
    absences,
    class_students,
    classes,
    grades,
    homework,
    meetings,
    parent_children,
    student_homework,
    subject_students,
    subjects,
    testing,
    users,
);
