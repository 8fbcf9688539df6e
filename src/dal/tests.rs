use super::*;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 10, d).unwrap()
}

async fn user(db: &DB, email: &str) -> User {
    db.create_user(email.to_string(), "hash".to_string(), email.to_string())
        .await
        .unwrap()
        .unwrap()
}

fn meeting(subject: i32, teacher: i32, date: NaiveDate, hour: i32) -> Meeting {
    Meeting {
        id: 0,
        meeting_name: "Lesson".to_string(),
        teacher_id: teacher,
        subject_id: subject,
        date,
        hour,
        is_mandatory: true,
        url: String::new(),
        details: String::new(),
        is_substitution: false,
        is_grading: false,
        is_written_assessment: false,
        is_test: false,
    }
}

#[tokio::test]
async fn first_user_is_admin() {
    let db = DB::in_memory().unwrap();
    let first = user(&db, "first@school.si").await;
    let second = user(&db, "second@school.si").await;
    assert_eq!(first.role, Role::Admin);
    assert_eq!(second.role, Role::Unverified);
    assert_eq!(second.id, first.id + 1);
}

#[tokio::test]
async fn emails_are_unique() {
    let db = DB::in_memory().unwrap();
    let _ = user(&db, "a@school.si").await;
    let dup = db
        .create_user("a@school.si".to_string(), "x".to_string(), "A".to_string())
        .await
        .unwrap();
    assert!(dup.is_none());
    assert_eq!(db.get_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn class_membership() {
    let db = DB::in_memory().unwrap();
    let teacher = user(&db, "t@school.si").await;
    let student = user(&db, "s@school.si").await;
    let class = db
        .create_class("1.a".to_string(), teacher.id, "2021/22".to_string())
        .await
        .unwrap();

    assert!(db.add_class_student(class, student.id).await.unwrap());
    assert!(!db.add_class_student(class, student.id).await.unwrap());
    let roster = db.get_class_students(class).await.unwrap();
    assert_eq!(roster.into_iter().collect::<Vec<_>>(), vec![student.id]);

    db.remove_class_student(class, 1234).await.unwrap();
    assert_eq!(db.get_class_students(class).await.unwrap().len(), 1);

    db.remove_class_student(class, student.id).await.unwrap();
    assert!(db.get_class_students(class).await.unwrap().is_empty());
}

#[tokio::test]
async fn inheriting_subjects_follow_their_class() {
    let db = DB::in_memory().unwrap();
    let teacher = user(&db, "t@school.si").await;
    let s1 = user(&db, "s1@school.si").await;
    let s2 = user(&db, "s2@school.si").await;
    let class = db
        .create_class("1.a".to_string(), teacher.id, "2021/22".to_string())
        .await
        .unwrap();
    assert!(db.add_class_student(class, s1.id).await.unwrap());

    let math = db
        .create_subject(teacher.id, "MAT".to_string(), "Maths".to_string(), Some(class))
        .await
        .unwrap();
    let (subject, roster) = db.get_subject_with_students(math).await.unwrap().unwrap();
    assert!(subject.inherits_class);
    assert_eq!(roster.into_iter().collect::<Vec<_>>(), vec![s1.id]);

    assert!(db.add_class_student(class, s2.id).await.unwrap());
    let (_, roster) = db.get_subject_with_students(math).await.unwrap().unwrap();
    assert_eq!(roster.into_iter().collect::<Vec<_>>(), vec![s1.id, s2.id]);

    db.delete_class(class).await.unwrap();
    let (_, roster) = db.get_subject_with_students(math).await.unwrap().unwrap();
    assert!(roster.is_empty());
}

#[tokio::test]
async fn own_roster_subjects() {
    let db = DB::in_memory().unwrap();
    let teacher = user(&db, "t@school.si").await;
    let student = user(&db, "s@school.si").await;
    let art = db
        .create_subject(teacher.id, "ART".to_string(), String::new(), None)
        .await
        .unwrap();

    assert!(db.add_subject_student(art, student.id).await.unwrap());
    assert!(!db.add_subject_student(art, student.id).await.unwrap());
    let subjects = db.get_subjects().await.unwrap();
    assert_eq!(subjects.len(), 1);
    assert!(subjects[0].1.contains(&student.id));

    db.remove_subject_student(art, student.id).await.unwrap();
    db.remove_subject_student(art, student.id).await.unwrap();
    let (_, roster) = db.get_subject_with_students(art).await.unwrap().unwrap();
    assert!(roster.is_empty());
}

#[tokio::test]
async fn realization_counts_meetings() {
    let db = DB::in_memory().unwrap();
    let teacher = user(&db, "t@school.si").await;
    let subject = db
        .create_subject(teacher.id, "MAT".to_string(), String::new(), None)
        .await
        .unwrap();

    let first = db
        .create_meeting(meeting(subject, teacher.id, day(4), 1))
        .await
        .unwrap();
    let _ = db
        .create_meeting(meeting(subject, teacher.id, day(5), 2))
        .await
        .unwrap();
    let realization = db.get_subject(subject).await.unwrap().unwrap().realization;
    assert_eq!(realization, 2.0);

    db.delete_meeting(first).await.unwrap();
    let realization = db.get_subject(subject).await.unwrap().unwrap().realization;
    assert_eq!(realization, 1.0);

    let between = db.get_meetings_between(day(1), day(4)).await.unwrap();
    assert!(between.is_empty());
    let between = db.get_meetings_between(day(5), day(5)).await.unwrap();
    assert_eq!(between.len(), 1);
}

#[tokio::test]
async fn absences_are_replaced() {
    let db = DB::in_memory().unwrap();
    let teacher = user(&db, "t@school.si").await;
    let student = user(&db, "s@school.si").await;
    let subject = db
        .create_subject(teacher.id, "MAT".to_string(), String::new(), None)
        .await
        .unwrap();
    let m = db
        .create_meeting(meeting(subject, teacher.id, day(4), 1))
        .await
        .unwrap();

    let first = db
        .set_absence(m, student.id, teacher.id, AbsenceType::Absent, false)
        .await
        .unwrap();
    let second = db
        .set_absence(m, student.id, teacher.id, AbsenceType::Late, true)
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.absence_type, AbsenceType::Late);
    assert!(second.is_excused);
    assert_eq!(db.get_absences_for_meeting(m).await.unwrap().len(), 1);

    db.delete_meeting(m).await.unwrap();
    assert!(db.get_absences_for_user(student.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_a_user_takes_their_records() {
    let db = DB::in_memory().unwrap();
    let teacher = user(&db, "t@school.si").await;
    let student = user(&db, "s@school.si").await;
    let parent = user(&db, "p@school.si").await;
    let class = db
        .create_class("1.a".to_string(), teacher.id, "2021/22".to_string())
        .await
        .unwrap();
    assert!(db.add_class_student(class, student.id).await.unwrap());
    assert!(db.add_child(parent.id, student.id).await.unwrap());
    assert!(!db.add_child(parent.id, student.id).await.unwrap());
    let _ = db
        .set_testing(student.id, teacher.id, class, day(4), TestingResult::Negative)
        .await
        .unwrap();

    db.delete_user(student.id).await.unwrap();
    assert!(db.get_user(student.id).await.unwrap().is_none());
    assert!(db.get_class_students(class).await.unwrap().is_empty());
    assert!(db.get_children(parent.id).await.unwrap().is_empty());
    assert!(db.get_testing(student.id, day(4)).await.unwrap().is_none());
}

#[tokio::test]
async fn homework_statuses() {
    let db = DB::in_memory().unwrap();
    let teacher = user(&db, "t@school.si").await;
    let student = user(&db, "s@school.si").await;
    let subject = db
        .create_subject(teacher.id, "MAT".to_string(), String::new(), None)
        .await
        .unwrap();
    let m = db
        .create_meeting(meeting(subject, teacher.id, day(4), 1))
        .await
        .unwrap();
    let hw = db
        .create_homework(Homework {
            id: 0,
            teacher_id: teacher.id,
            subject_id: subject,
            meeting_id: m,
            name: "Exercises".to_string(),
            description: String::new(),
            to_date: day(11),
            from_date: day(4),
        })
        .await
        .unwrap();

    db.set_homework_status(hw, student.id, HomeworkStatus::NotDone)
        .await
        .unwrap();
    db.set_homework_status(hw, student.id, HomeworkStatus::Done)
        .await
        .unwrap();
    let all = db.get_homework_for_subject(subject).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].1.get(&student.id), Some(&HomeworkStatus::Done));
}
